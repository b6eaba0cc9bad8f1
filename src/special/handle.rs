//! Bound op instances returned by the matcher.

use crate::core::error::OpResult;
use crate::matching::{OpEnvironment, OpInfo};
use crate::special::{Concurrency, SpecialOp};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies one instantiated op.
pub type InstanceId = Uuid;

type Replicator<V> = Arc<dyn Fn() -> OpResult<Arc<V>> + Send + Sync>;

/// A resolved, initialized op viewed through the trait object `V`.
///
/// Dereferences to `V`, so calls go straight to the op:
///
/// ```rust,ignore
/// let op = env.op("math.subtract").arg(5.0).unary_computer::<u8, u8>()?;
/// let mut out = 0u8;
/// op.compute1(&12, &mut out)?;
/// ```
pub struct OpHandle<V: ?Sized> {
    op: Arc<V>,
    info: Arc<OpInfo>,
    env: Option<OpEnvironment>,
    replicate: Replicator<V>,
    concurrency: Concurrency,
    instance_id: InstanceId,
}

impl<V: SpecialOp + ?Sized + 'static> OpHandle<V> {
    /// Build a handle from a factory producing ready-to-use instances.
    ///
    /// The factory is called once now and again for every independent
    /// instance an [`Concurrency::Independent`] op hands out.
    pub fn from_factory<F>(info: Arc<OpInfo>, env: Option<OpEnvironment>, factory: F) -> OpResult<Self>
    where
        F: Fn() -> OpResult<Arc<V>> + Send + Sync + 'static,
    {
        let op = factory()?;
        Ok(Self::new(op, info, env, factory))
    }

    /// Build a handle around an instance that was already created by
    /// `replicate`.
    pub fn new<F>(op: Arc<V>, info: Arc<OpInfo>, env: Option<OpEnvironment>, replicate: F) -> Self
    where
        F: Fn() -> OpResult<Arc<V>> + Send + Sync + 'static,
    {
        let concurrency = op.concurrency();
        Self {
            op,
            info,
            env,
            replicate: Arc::new(replicate),
            concurrency,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Wrap an already-built op. Independent copies cannot be replicated
    /// from scratch, so the op is shared regardless of its policy.
    pub fn shared(info: Arc<OpInfo>, op: Arc<V>) -> Self {
        let template = op.clone();
        Self {
            op,
            info,
            env: None,
            replicate: Arc::new(move || Ok(template.clone())),
            concurrency: Concurrency::Shared,
            instance_id: Uuid::new_v4(),
        }
    }

    /// An instance safe to use concurrently with this one.
    ///
    /// Shared ops return a handle to the same instance; ops owning scratch
    /// state get a freshly instantiated and initialized copy.
    pub fn independent_instance(&self) -> OpResult<Self> {
        match self.concurrency {
            Concurrency::Shared => Ok(self.clone()),
            Concurrency::Independent => Ok(Self {
                op: (self.replicate)()?,
                info: self.info.clone(),
                env: self.env.clone(),
                replicate: self.replicate.clone(),
                concurrency: self.concurrency,
                instance_id: Uuid::new_v4(),
            }),
        }
    }
}

impl<V: ?Sized> OpHandle<V> {
    /// The underlying op.
    pub fn op(&self) -> &Arc<V> {
        &self.op
    }

    /// Declared metadata of the implementation.
    pub fn info(&self) -> &OpInfo {
        &self.info
    }

    /// Implementation id.
    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Environment the op was resolved in.
    pub fn env(&self) -> Option<&OpEnvironment> {
        self.env.as_ref()
    }

    /// Identity of this instance.
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Sharing policy of the op.
    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    /// Check if two handles point at the same instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.op, &b.op)
    }
}

impl<V: ?Sized> Clone for OpHandle<V> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            info: self.info.clone(),
            env: self.env.clone(),
            replicate: self.replicate.clone(),
            concurrency: self.concurrency,
            instance_id: self.instance_id,
        }
    }
}

impl<V: ?Sized> Deref for OpHandle<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.op
    }
}

impl<V: ?Sized> fmt::Debug for OpHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpHandle")
            .field("id", &self.info.id)
            .field("concurrency", &self.concurrency)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::special::{SpecialType, UnaryComputerOp};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        scratch: Mutex<Vec<u8>>,
        independent: bool,
    }

    impl SpecialOp for Counter {
        fn special_type(&self) -> SpecialType {
            SpecialType::UnaryComputer
        }

        fn concurrency(&self) -> Concurrency {
            if self.independent {
                Concurrency::Independent
            } else {
                Concurrency::Shared
            }
        }
    }

    impl UnaryComputerOp<u8, usize> for Counter {
        fn compute1(&self, input: &u8, output: &mut usize) -> OpResult<()> {
            let mut scratch = self.scratch.lock();
            scratch.push(*input);
            *output = scratch.len();
            Ok(())
        }
    }

    fn handle(independent: bool) -> (OpHandle<dyn UnaryComputerOp<u8, usize>>, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let info = Arc::new(OpInfo::builder("test.counter", "test.counter").build());
        let handle = OpHandle::from_factory(info, None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let op: Arc<dyn UnaryComputerOp<u8, usize>> = Arc::new(Counter {
                scratch: Mutex::new(Vec::new()),
                independent,
            });
            Ok(op)
        })
        .unwrap();
        (handle, built)
    }

    #[test]
    fn test_shared_instance_is_same() {
        let (op, built) = handle(false);
        let a = op.independent_instance().unwrap();
        let b = op.independent_instance().unwrap();
        assert!(OpHandle::ptr_eq(&a, &b));
        assert_eq!(a.instance_id(), b.instance_id());
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_independent_instances_are_disjoint() {
        let (op, built) = handle(true);
        let a = op.independent_instance().unwrap();
        let b = op.independent_instance().unwrap();
        assert!(!OpHandle::ptr_eq(&a, &b));
        assert_ne!(a.instance_id(), b.instance_id());
        assert_eq!(built.load(Ordering::SeqCst), 3);

        let mut out = 0;
        a.compute1(&1, &mut out).unwrap();
        a.compute1(&2, &mut out).unwrap();
        assert_eq!(out, 2);

        b.compute1(&3, &mut out).unwrap();
        assert_eq!(out, 1);
    }
}
