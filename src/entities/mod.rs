pub mod client;
pub mod order;
pub mod order_view;
pub mod product;
pub mod stock_movement;

pub use client::Entity as Client;
pub use order::Entity as Order;
pub use order_view::Entity as OrderView;
pub use product::Entity as Product;
pub use stock_movement::Entity as StockMovement;
