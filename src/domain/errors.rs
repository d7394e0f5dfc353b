use thiserror::Error;

/// Invalid or missing required option at startup; fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config key: {key}")]
    Missing { key: String },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Any persistence fault, retried at the call site, escalated if persistent.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage operation '{operation}' failed: {source}")]
    Backend {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("outcome references unknown decision id: {decision_id}")]
    UnknownDecision { decision_id: String },
}

/// Malformed LLM output after remediation; handled by orchestrator retry, else safe HOLD.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("failed to parse agent output as JSON: {reason}")]
    ParseFailed { reason: String },

    #[error("missing required agent section: {agent}")]
    MissingAgent { agent: String },

    #[error("field '{field}' on agent '{agent}' violates its domain: {reason}")]
    FieldViolation {
        agent: String,
        field: String,
        reason: String,
    },
}

/// Breaker refusing a call; caller consults the fallback registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("circuit breaker '{name}' is open")]
pub struct CircuitOpenError {
    pub name: String,
}

/// No handler registered for a requested fallback capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no fallback registered for capability '{capability}'")]
pub struct NoFallbackError {
    pub capability: String,
}

/// Transport or broker faults, classified into transient (retryable) and permanent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("adapter disconnected")]
    Disconnected,

    #[error("transient adapter fault: {reason}")]
    Transient { reason: String },

    #[error("permanent adapter fault: {reason}")]
    Permanent { reason: String },
}

/// Daily decision/cost limit; triggers rule-based fallback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("budget exceeded: {resource} (limit {limit}, used {used})")]
pub struct BudgetExceededError {
    pub resource: String,
    pub limit: u64,
    pub used: u64,
}

/// Market conditions blocking the Market validation layer of the Execution Bridge.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketError {
    #[error("market is closed for {symbol}")]
    MarketClosed { symbol: String },

    #[error("no quote available for {symbol}")]
    NoQuote { symbol: String },

    #[error("spread too wide for {symbol}: {spread_pips} pips > max {max_pips} pips")]
    SpreadTooWide {
        symbol: String,
        spread_pips: f64,
        max_pips: f64,
    },

    #[error("stop loss too close for {symbol}: {distance_pips} pips < min {min_pips} pips")]
    StopLossTooClose {
        symbol: String,
        distance_pips: f64,
        min_pips: f64,
    },
}

/// Input/Symbol layer faults of the Execution Bridge.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationLayerError {
    #[error("input invalid: {reason}")]
    InputInvalid { reason: String },

    #[error("size invalid: {reason}")]
    SizeInvalid { reason: String },

    #[error("adapter disconnected")]
    AdapterDisconnected,

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("symbol not tradable right now: {symbol}")]
    SymbolNotTradable { symbol: String },
}

/// Symbol Normalizer failures (spec.md §4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("unknown symbol: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("unit not supported for {symbol}: {unit}")]
    InvalidUnit { symbol: String, unit: String },
}

/// Aggregate surfaced to the Decision Engine; every subordinate component's
/// error converts into one of these variants so the engine can match on kind
/// to decide retry, escalate, or fall back to a HOLD iteration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    BudgetExceeded(#[from] BudgetExceededError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    ValidationLayer(#[from] ValidationLayerError),

    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    NoFallback(#[from] NoFallbackError),
}
