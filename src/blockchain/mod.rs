pub mod ethereum;
pub mod mock;
pub mod traits;

pub use ethereum::EthersClient;
pub use traits::{ChainClient, ContractCall, SubmitError, SubmitErrorCode, TxReceipt, WalletSession};
