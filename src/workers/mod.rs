pub mod terminal_poller;
pub mod transaction_watcher;

pub use terminal_poller::{backoff_delay, wait_for_terminal, wait_for_terminal_with, PollOptions};
pub use transaction_watcher::{
    Callbacks, TransactionObserver, TransactionWatcher, WatchError, WatchHandle, WatchRequest,
};
