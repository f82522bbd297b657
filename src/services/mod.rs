pub mod clients;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod stock;

use std::sync::Arc;

use crate::cache::DataCache;
use crate::db::Gateway;

pub use clients::ClientService;
pub use invoices::InvoiceService;
pub use orders::OrderService;
pub use products::ProductService;
pub use stock::StockService;

/// Business services sharing one gateway and one data cache.
#[derive(Clone)]
pub struct AppServices {
    pub clients: ClientService,
    pub products: ProductService,
    pub stock: StockService,
    pub orders: OrderService,
    pub invoices: InvoiceService,
}

impl AppServices {
    pub fn new(gateway: Arc<Gateway>, cache: DataCache, client_email_domain: &str) -> Self {
        Self {
            clients: ClientService::new(gateway.clone(), cache.clone(), client_email_domain),
            products: ProductService::new(gateway.clone(), cache.clone()),
            stock: StockService::new(gateway.clone(), cache.clone()),
            orders: OrderService::new(gateway.clone(), cache.clone()),
            invoices: InvoiceService::new(gateway, cache),
        }
    }
}
