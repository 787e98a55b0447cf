/// Classification for provider failover.
///
/// Used by the provider registry to decide what happens after a provider
/// returns an error.
///
/// | Class | Try Next Provider? | Record Circuit Breaker Failure? |
/// |-------|-------------------|--------------------------------|
/// | `Never` | No | No |
/// | `FailoverWithPenalty` | Yes | Yes |
/// | `NextProvider` | Yes | No |
/// | `CircuitOpen` | Yes (skip this one) | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Terminal: the symbol is unknown or the request is invalid.
    Never,

    /// Transient upstream trouble (429, timeout). Fail over and count the
    /// failure against the provider's circuit.
    FailoverWithPenalty,

    /// This provider can't serve the request but another might.
    NextProvider,

    /// Circuit breaker is open for this provider.
    CircuitOpen,
}
