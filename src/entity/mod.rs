pub mod cart_items;
pub mod orders;
pub mod products;
pub mod shopping_carts;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use shopping_carts::Entity as ShoppingCarts;
pub use users::Entity as Users;
