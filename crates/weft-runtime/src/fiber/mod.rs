//! Stackful fibers
//!
//! A [`Fiber`] owns a call stack and a callable. [`resume`] transfers the
//! current thread into it; the fiber runs until it calls [`yield_now`]
//! (or [`yield_to`]) or its callable returns, and control comes back to
//! whoever resumed it last.
//!
//! ```text
//! uninitialized ──(new | reset)──▶ initialized ──(resume)──▶ running
//! running ──(yield)──▶ yielded ──(resume)──▶ running
//! running ──(callable returns)──▶ ended ──(reset)──▶ initialized
//! ```
//!
//! Fibers are resumed on the thread that owns them; `Fiber` is not
//! `Send`. A fiber that resumes another counts as suspended (`yielded`)
//! until control comes back, so at most one fiber per thread is
//! `running`.
//!
//! # Example
//!
//! ```ignore
//! use weft_runtime::fiber::{resume, yield_now, Fiber};
//!
//! let mut f = Fiber::new(|| {
//!     println!("first");
//!     yield_now();
//!     println!("second");
//! });
//! resume(&mut f); // prints "first"
//! resume(&mut f); // prints "second", f is now ended
//! ```

mod engine;

use crate::arch::{make_context, Context};
use crate::memory::Stack;
use crate::{config, telemetry, tls};
use std::alloc::{handle_alloc_error, Layout};
use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::ptr::{self, NonNull};
use weft_core::constants::STACK_ALIGN;
use weft_core::error::{FiberError, FiberResult};
use weft_core::id::FiberId;
use weft_core::status::FiberStatus;
use weft_core::{kdebug, kerror};

type Callable = Box<dyn FnOnce()>;

/// Heap-pinned state of a fiber
///
/// Other fibers, the thread-local current pointer and in-flight switch
/// records refer to it by address, so it never moves.
#[repr(C)]
pub(crate) struct FiberInner {
    /// Saved context while not running. Must stay the first field.
    pub(crate) context: Cell<Context>,
    pub(crate) status: Cell<FiberStatus>,
    pub(crate) id: FiberId,
    pub(crate) thread_idx: Cell<u8>,
    /// Target of yield and of the hand-back when the callable returns
    pub(crate) resumer: Cell<*const FiberInner>,
    stack: UnsafeCell<Option<Stack>>,
    callable: Cell<Option<Callable>>,
}

impl FiberInner {
    #[inline]
    pub(crate) fn has_stack(&self) -> bool {
        self.stack().is_some()
    }

    #[inline]
    fn stack(&self) -> Option<&Stack> {
        // SAFETY: the stack is only replaced through `&mut Fiber`
        unsafe { (*self.stack.get()).as_ref() }
    }
}

/// A stackful, manually-switched execution unit
pub struct Fiber {
    inner: NonNull<FiberInner>,
}

impl Fiber {
    /// Create a fiber running `f` on a stack of the configured default
    /// size (`WEFT_STACK_SIZE`, 512 KiB unless overridden).
    ///
    /// Stack allocation failure is fatal.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self::with_stack_size(config::global().stack_size, f)
    }

    /// Create a fiber running `f` on a stack of at least `size` bytes.
    ///
    /// Stack allocation failure is fatal.
    pub fn with_stack_size<F>(size: usize, f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        let fiber = Self::alloc(Some(stack_or_abort(size)), FiberStatus::Uninitialized);
        fiber.install(Box::new(f), 0);
        fiber
    }

    /// Fallible variant of [`with_stack_size`](Self::with_stack_size).
    pub fn try_new<F>(size: usize, f: F) -> FiberResult<Self>
    where
        F: FnOnce() + 'static,
    {
        let stack = Stack::new(size)?;
        let fiber = Self::alloc(Some(stack), FiberStatus::Uninitialized);
        fiber.install(Box::new(f), 0);
        Ok(fiber)
    }

    /// Allocate a stack but no callable; [`reset`](Self::reset) installs
    /// one later.
    pub fn uninit(size: usize) -> Self {
        Self::alloc(Some(stack_or_abort(size)), FiberStatus::Uninitialized)
    }

    /// A handle for the calling thread's own context.
    ///
    /// Has no stack and starts out running. Resuming a fiber through it
    /// makes it that fiber's resumer, so it must outlive the fibers it
    /// resumes.
    pub fn root() -> Self {
        Self::alloc(None, FiberStatus::Running)
    }

    fn alloc(stack: Option<Stack>, status: FiberStatus) -> Self {
        let inner = Box::new(FiberInner {
            context: Cell::new(Context::null()),
            status: Cell::new(status),
            id: FiberId::next(),
            thread_idx: Cell::new(0),
            resumer: Cell::new(ptr::null()),
            stack: UnsafeCell::new(stack),
            callable: Cell::new(None),
        });
        // SAFETY: Box::into_raw never returns null
        let inner = unsafe { NonNull::new_unchecked(Box::into_raw(inner)) };
        Fiber { inner }
    }

    /// Install a callable on a stackful fiber and point its context at
    /// the entry trampoline.
    fn install(&self, f: Callable, thread_idx: u8) {
        let inner = self.inner();
        let Some(stack) = inner.stack() else {
            return;
        };

        // SAFETY: the fiber is not running, so nothing lives on its stack
        let ctx = unsafe { make_context(stack.top(), stack.size(), engine::fiber_main) };

        inner.callable.set(Some(f));
        inner.thread_idx.set(thread_idx);
        inner.resumer.set(ptr::null());
        inner.context.set(ctx);
        inner.status.set(FiberStatus::Initialized);
        telemetry::begin(inner.id);
    }

    /// Install a new callable on an `uninitialized` or `ended` fiber.
    ///
    /// The previous callable is dropped first. The existing stack is
    /// reused; a fiber without one gets a stack of the default size
    /// (allocation failure is fatal).
    ///
    /// Each installed callable is a new life of the same fiber id: the
    /// observer sees `on_begin` again, paired with the `on_detach` that
    /// ends this life.
    pub fn reset<F>(&mut self, f: F, thread_idx: u8)
    where
        F: FnOnce() + 'static,
    {
        debug_assert!(
            self.status().is_resettable(),
            "reset of fiber {} while {}",
            self.id(),
            self.status()
        );
        drop(self.inner().callable.take());

        if !self.inner().has_stack() {
            let stack = stack_or_abort(config::global().stack_size);
            // SAFETY: exclusive access through &mut self
            unsafe { *self.inner().stack.get() = Some(stack) };
        }
        self.install(Box::new(f), thread_idx);
    }

    /// Checked variant of [`reset`](Self::reset).
    pub fn try_reset<F>(&mut self, f: F, thread_idx: u8) -> FiberResult<()>
    where
        F: FnOnce() + 'static,
    {
        let status = self.status();
        if !status.is_resettable() {
            return Err(FiberError::InvalidStatus { op: "reset", status });
        }
        drop(self.inner().callable.take());

        if !self.inner().has_stack() {
            let stack = Stack::new(config::global().stack_size)?;
            // SAFETY: exclusive access through &mut self
            unsafe { *self.inner().stack.get() = Some(stack) };
        }
        self.install(Box::new(f), thread_idx);
        Ok(())
    }

    /// Resume `target` from this fiber, which must be the one running
    /// on this thread.
    ///
    /// A root handle may resume from the thread's own context as long as
    /// no stackful fiber is running there.
    ///
    /// Blocks until `target` yields or ends, then returns it.
    pub fn resume<'a>(&mut self, target: &'a mut Fiber) -> &'a mut Fiber {
        debug_assert_eq!(
            self.status(),
            FiberStatus::Running,
            "resume from fiber {} that is not running",
            self.id()
        );
        debug_assert!(
            self.is_current(),
            "resume from fiber {} that is not current on this thread",
            self.id()
        );
        resume_from(self.inner(), target)
    }

    /// Whether this fiber owns the context live on the calling thread
    fn is_current(&self) -> bool {
        let cur = tls::current();
        if ptr::eq(cur, self.inner_ptr()) {
            return true;
        }
        // SAFETY: CURRENT only ever holds live fibers
        let stackful_running = unsafe { cur.as_ref() }.is_some_and(FiberInner::has_stack);
        self.is_root() && !stackful_running
    }

    #[inline]
    pub fn status(&self) -> FiberStatus {
        self.inner().status.get()
    }

    #[inline]
    pub fn id(&self) -> FiberId {
        self.inner().id
    }

    /// Advisory tag naming the worker thread that owns this fiber
    #[inline]
    pub fn thread_idx(&self) -> u8 {
        self.inner().thread_idx.get()
    }

    /// Usable stack size in bytes (0 for root fibers)
    #[inline]
    pub fn stack_size(&self) -> usize {
        self.inner().stack().map_or(0, Stack::size)
    }

    /// Whether this is a stackless handle for a thread's own context
    #[inline]
    pub fn is_root(&self) -> bool {
        !self.inner().has_stack()
    }

    #[inline]
    fn inner(&self) -> &FiberInner {
        // SAFETY: inner is owned by self and freed only in Drop
        unsafe { self.inner.as_ref() }
    }

    #[inline]
    pub(crate) fn inner_ptr(&self) -> *const FiberInner {
        self.inner.as_ptr()
    }
}

impl Drop for Fiber {
    fn drop(&mut self) {
        let inner = self.inner();
        let status = inner.status.get();
        debug_assert!(
            !(inner.has_stack() && status == FiberStatus::Running),
            "fiber {} dropped while running",
            inner.id
        );

        // A life that began but never returned still gets its detach
        if inner.has_stack() && status.has_context() {
            telemetry::detach(inner.id);
        }
        tls::clear_current_if(self.inner_ptr());

        // SAFETY: allocated by Box::into_raw in `alloc`, freed once here
        unsafe { drop(Box::from_raw(self.inner.as_ptr())) };
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("thread_idx", &self.thread_idx())
            .field("stack_size", &self.stack_size())
            .finish()
    }
}

fn stack_or_abort(size: usize) -> Stack {
    match Stack::new(size) {
        Ok(stack) => stack,
        Err(e) => {
            kerror!("cannot allocate {} byte fiber stack: {}", size, e);
            let layout = Layout::from_size_align(size.max(1), STACK_ALIGN)
                .unwrap_or_else(|_| Layout::new::<u8>());
            handle_alloc_error(layout)
        }
    }
}

fn resume_from<'a>(former: &FiberInner, target: &'a mut Fiber) -> &'a mut Fiber {
    let latter = target.inner();
    debug_assert!(
        latter.status.get().is_resumable() && latter.has_stack(),
        "resume of fiber {} while {}",
        latter.id,
        latter.status.get()
    );
    debug_assert!(!ptr::eq(former, latter), "fiber {} resumed itself", latter.id);

    if config::global().debug_logging {
        kdebug!("resume {} -> {}", former.id, latter.id);
    }

    latter.resumer.set(former);
    former.status.set(FiberStatus::Yielded);
    latter.status.set(FiberStatus::Running);

    // SAFETY: former is live on this thread; latter holds a saved context
    unsafe { engine::switch(former, latter) };
    target
}

/// Resume `target` from whatever is running on this thread.
///
/// Outside any fiber the thread's implicit root becomes the resumer.
/// Blocks until `target` yields or ends, then returns it.
pub fn resume(target: &mut Fiber) -> &mut Fiber {
    // SAFETY: current_or_root never returns null
    let former = unsafe { &*tls::current_or_root() };
    resume_from(former, target)
}

/// Checked variant of [`resume`]: fails instead of asserting when
/// `target` cannot be resumed.
pub fn try_resume(target: &mut Fiber) -> FiberResult<&mut Fiber> {
    let status = target.status();
    if !status.is_resumable() || target.is_root() {
        return Err(FiberError::InvalidStatus { op: "resume", status });
    }
    Ok(resume(target))
}

/// Suspend the running fiber and return to its most recent resumer.
///
/// Outside a fiber this is a contract violation: debug builds panic,
/// release builds return without switching.
pub fn yield_now() {
    // SAFETY: CURRENT only ever holds live fibers
    let Some(me) = (unsafe { tls::current().as_ref() }) else {
        debug_assert!(false, "yield_now called outside a fiber");
        return;
    };
    // SAFETY: a resumer outlives the fibers it resumes
    let resumer = match unsafe { me.resumer.get().as_ref() } {
        Some(r) if me.has_stack() => r,
        _ => {
            debug_assert!(false, "yield_now from fiber {} with no resumer", me.id);
            return;
        }
    };

    if config::global().debug_logging {
        kdebug!("yield {} -> {}", me.id, resumer.id);
    }

    me.status.set(FiberStatus::Yielded);
    resumer.status.set(FiberStatus::Running);
    // SAFETY: me is live on this thread; resumer is suspended
    unsafe { engine::switch(me, resumer) };
}

/// Suspend the running fiber and continue `to` instead of the resumer.
///
/// The yielding fiber becomes `to`'s resumer, so when `to` next yields
/// or ends, control comes back here.
pub fn yield_to(to: &mut Fiber) {
    let latter = to.inner();
    debug_assert!(
        latter.status.get().is_resumable() && latter.has_stack(),
        "yield_to fiber {} while {}",
        latter.id,
        latter.status.get()
    );
    // SAFETY: CURRENT only ever holds live fibers
    let Some(me) = (unsafe { tls::current().as_ref() }) else {
        debug_assert!(false, "yield_to called outside a fiber");
        return;
    };
    debug_assert!(!ptr::eq(me, latter), "fiber {} yielded to itself", me.id);

    if config::global().debug_logging {
        kdebug!("yield {} -> {}", me.id, latter.id);
    }

    latter.resumer.set(me);
    me.status.set(FiberStatus::Yielded);
    latter.status.set(FiberStatus::Running);
    // SAFETY: me is live on this thread; latter holds a saved context
    unsafe { engine::switch(me, latter) };
}

/// Id of the stackful fiber running on this thread, if any
pub fn current_id() -> Option<FiberId> {
    tls::current_fiber_id()
}
