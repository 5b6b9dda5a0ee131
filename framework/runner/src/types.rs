/// Recommended error type for your scenario `main` function and any code shared between
/// scenarios, so that you can use `?` to propagate errors from the runner.
pub type GaleResult<T> = anyhow::Result<T>;
