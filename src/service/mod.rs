pub mod approval_hooks;
pub mod balance_normalizer;
pub mod client_selector;
pub mod execution_engine;
pub mod orchestrator;
pub mod wallet_network;

pub use approval_hooks::{
    ApprovalCapability, ApprovalRegistry, AutoConfirm, ConfirmationGate, ProviderApprovalCapability,
    UserConfirmation,
};
pub use balance_normalizer::{BalanceNormalizer, NormalizedAsset};
pub use client_selector::{ExecutionClientSelector, WalletSession};
pub use execution_engine::{
    EngineError, EngineFactory, ExecutionContext, ExecutionEngine, ExecutionParams,
    OperationProgress,
};
pub use orchestrator::TransferOrchestrator;
pub use wallet_network::WalletNetworkController;
