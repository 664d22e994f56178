pub mod event_bus;
pub mod logging;
pub mod wallet_provider;

pub use event_bus::{ListenerId, ProgressEventBus, ProgressHistory, ProgressListener};
pub use wallet_provider::{HttpWalletProvider, ProviderError, WalletProvider};
