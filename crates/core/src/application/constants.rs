// Application constants (no magic values)

/// Characters of engine stderr kept in a failure message
pub const STDERR_TAIL_CHARS: usize = 500;

/// Upper bound of a q-value
pub const MAX_Q_VALUE: f64 = 1.0;
