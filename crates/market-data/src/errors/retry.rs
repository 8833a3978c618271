/// Classification of a source failure during the fallback walk.
///
/// No class aborts the walk: every failure means "no quote from this source"
/// and the next source in priority order is tried. The class only decides how
/// loudly the failure is logged.
///
/// | Class | Logged at | Meaning |
/// |-------|-----------|---------|
/// | `Transient` | warn | The source misbehaved; a later attempt may succeed |
/// | `NextProvider` | debug | The source has nothing for this ticker/date |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Rate limiting, timeouts, network and server errors.
    Transient,

    /// Unknown symbol, no data for the date, implausible value or an
    /// unsupported operation. Another source might still have the price.
    NextProvider,
}
