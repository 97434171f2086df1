/// Configuration options for compiling a method body.
///
/// # Example
///
/// ```
/// use stackgen_core::compiler::MethodOptions;
///
/// let options = MethodOptions { max_locals: 16 };
/// assert_eq!(MethodOptions::default().max_locals, u16::MAX);
/// # let _ = options;
/// ```
#[derive(Debug, Clone)]
pub struct MethodOptions {
    /// Maximum number of local variable slots a body may declare.
    ///
    /// Default: `u16::MAX`
    pub max_locals: u16,
}

impl Default for MethodOptions {
    fn default() -> Self {
        Self {
            max_locals: u16::MAX,
        }
    }
}
