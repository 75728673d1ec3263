pub mod deck;
pub mod domain;
pub mod flow;
pub mod ledger;
pub mod ports;
pub mod reconcile;
pub mod rollover;
pub mod tier;

pub use domain::{DeviceRecord, Identity, ReadingResult, SeekerInfo, TarotCard, UserProfile};
pub use flow::{Category, FlowError, ReadingSession, Screen};
pub use ledger::{coin_pack, CoinPack, SpendOutcome};
pub use ports::{
    CardImageService, CheckoutService, CheckoutSession, CompletedPayment, InterpretationRequest,
    InterpretationService, LocalSnapshot, LocalStore, PaymentConfirmService, PortError, PortResult,
    ProfileStore,
};
pub use tier::Tier;
