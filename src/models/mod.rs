mod actor;
mod dispute;
mod fee_rule;
mod item;
mod ledger;
mod payment;
mod user;
mod withdrawal;

pub use actor::Actor;
pub use dispute::{CreateDispute, Dispute, DisputeStatus};
pub use fee_rule::{FeeRule, PlatformSettings};
pub use item::{CreateItem, Item, ItemStatus};
pub use ledger::{Earning, EarningStatus, PlatformFee};
pub use payment::{ChargeOutcome, CreatePayment, Payment, PaymentStatus};
pub use user::{CreateUser, User, UserRole};
pub use withdrawal::{Withdrawal, WithdrawalStatus};
