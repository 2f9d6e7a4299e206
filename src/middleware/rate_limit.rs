use std::sync::Arc;

use axum::body::Body;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

/// Type alias for the IP-based governor layer used on public routes.
pub type PublicGovernorLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    Body,
>;

/// Create a GovernorLayer for public routes (per IP address):
/// 100 requests per minute. Webhook routes are excluded; the payment
/// processor's retry traffic must never be throttled.
pub fn create_public_governor() -> PublicGovernorLayer {
    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(600)
            .burst_size(100)
            .finish()
            .unwrap(),
    );

    GovernorLayer::new(config)
}
