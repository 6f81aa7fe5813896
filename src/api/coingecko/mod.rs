pub mod price;

pub use price::CoinGeckoClient;
