use crate::exception::asynchronous::exec_with_irq_masked;

pub mod interface {
    pub trait Mutex {
        type Data;

        fn lock<R>(&self, f: impl FnOnce(&mut Self::Data) -> R) -> R;
    }
}

/// Spin lock that keeps local IRQs masked while held.
///
/// Masking keeps an interrupt handler on the same core from spinning on a lock its own
/// core already holds. Dispatch never takes this lock.
pub struct IRQSafeLock<T> where T: ?Sized {
    inner: spin::Mutex<T>,
}

impl<T> IRQSafeLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: spin::Mutex::new(data),
        }
    }
}

impl<T> interface::Mutex for IRQSafeLock<T> {
    type Data = T;

    fn lock<R>(&self, f: impl FnOnce(&mut Self::Data) -> R) -> R {
        exec_with_irq_masked(|| {
            let mut data = self.inner.lock();
            f(&mut *data)
        })
    }
}
