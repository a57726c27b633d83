/// Describes leaf resources which hold GPU-side memory that must be released explicitly
pub trait Disposable {
    /// Release the resource
    fn dispose(self);
}
