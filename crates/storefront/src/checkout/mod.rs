//! Checkout: cart, summary, order placement, gateway payment and recording.
//!
//! [`CheckoutOrchestrator`] drives one sequence at a time through
//! [`OrderPlacer`], [`GatewayClient`] and [`PaymentRecorder`].
//! [`CheckoutSummaryCalculator`] keeps the page's totals current.

pub mod cart;
pub mod gateway;
pub mod hosted;
pub mod orchestrator;
pub mod placer;
pub mod recorder;
pub mod sdk;
pub mod session;
pub mod summary;

pub use cart::{Cart, CartItem};
pub use gateway::{
    CheckoutOptions, GatewayClient, GatewaySuccessResponse, HostedCheckout, HostedCheckoutError,
    VerifiedPayment, WidgetOptions,
};
pub use hosted::BrowserCheckout;
pub use orchestrator::{
    Acknowledgement, CheckoutOrchestrator, CheckoutRequest, CheckoutRun, CheckoutSettings,
    CheckoutState, CheckoutStatus, FailureCause, ResumeRequest, SubmitRejected,
};
pub use placer::{CheckoutSelection, MissingSelection, OrderPlacer, PlaceOrderError, PlacedOrder};
pub use recorder::{PaymentDetails, PaymentRecorder};
pub use sdk::{SdkError, SdkLoader};
pub use session::{CheckoutSession, CheckoutSessions, SelectionError, SelectionUpdate, SessionView};
pub use summary::{CheckoutSummaryCalculator, SummaryView};
