//! The rendering seam between effect logic and a GPU API.
//!
//! Effects never talk to a graphics API directly. They describe fullscreen
//! passes against a [`RenderBackend`]: "run pass `n` of shader `s` reading
//! target `a` and writing target `b` with these uniforms". The wgpu
//! implementation lives in [`WgpuBackend`](crate::WgpuBackend).
//!
//! # Temporary targets
//!
//! Intermediate buffers come from the backend's temporary pool and must be
//! handed back before the effect returns. [`TemporaryScope`] enforces this:
//! everything acquired through it is released when the scope is dropped,
//! whichever way the effect exits.
//!
//! ```text
//! apply(source, dest)
//!   scope = TemporaryScope::new(backend)
//!   half  = scope.acquire(source.half())   ──┐
//!   scope.draw(downsample, source → half)    │ live
//!   scope.draw(blur, half → dest)            │
//! drop(scope)  ◀── releases `half` ──────────┘
//! ```

use std::fmt::Debug;

/// Pixel format of a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
    Rgba16Float,
}

/// Size and format of a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
}

impl TargetDesc {
    pub fn new(width: u32, height: u32, format: TargetFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Same format at half the resolution (never below one pixel).
    pub fn half(&self) -> Self {
        Self {
            width: (self.width >> 1).max(1),
            height: (self.height >> 1).max(1),
            format: self.format,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Extra inputs of a shader pass besides the main source texture.
#[derive(Clone, Copy, Debug)]
pub struct PassBindings<'a, T> {
    /// Raw bytes of the pass's uniform block, usually `bytemuck::bytes_of(&uniforms)`.
    pub uniforms: &'a [u8],
    /// Up to two auxiliary textures; unbound slots read as black.
    pub aux: [Option<T>; 2],
}

impl<'a, T> PassBindings<'a, T> {
    pub fn new(uniforms: &'a [u8]) -> Self {
        Self {
            uniforms,
            aux: [None, None],
        }
    }

    pub fn with_aux(mut self, slot: usize, target: T) -> Self {
        self.aux[slot] = Some(target);
        self
    }
}

/// A GPU API able to run fullscreen shader passes between render targets.
///
/// Implementations are used from the render thread only; nothing here needs
/// to be `Send` or `Sync`.
pub trait RenderBackend {
    /// Handle to a render target. Cheap to copy.
    type Target: Copy + Eq + Debug;
    /// Handle to a compiled shader program.
    type Shader: Clone;

    /// Size and format of `target`.
    fn describe(&self, target: Self::Target) -> TargetDesc;

    /// Take a target matching `desc` from the temporary pool.
    fn acquire_temporary(&mut self, desc: TargetDesc) -> Self::Target;

    /// Return a target obtained from [`acquire_temporary`](Self::acquire_temporary).
    fn release_temporary(&mut self, target: Self::Target);

    /// Copy `source` into `dest` unchanged, resampling if the sizes differ.
    fn copy(&mut self, source: Self::Target, dest: Self::Target);

    /// Run pass `pass` of `shader`, sampling `source` and writing `dest`.
    fn draw(
        &mut self,
        shader: &Self::Shader,
        pass: u32,
        source: Self::Target,
        dest: Self::Target,
        bindings: PassBindings<'_, Self::Target>,
    );
}

/// Looks up compiled shaders by symbolic name.
pub trait ShaderLibrary<S> {
    fn shader(&self, name: &str) -> Option<S>;
}

/// Borrow of a backend that tracks temporaries and releases them on drop.
pub struct TemporaryScope<'a, B: RenderBackend + ?Sized> {
    backend: &'a mut B,
    live: Vec<B::Target>,
}

impl<'a, B: RenderBackend + ?Sized> TemporaryScope<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            live: Vec::new(),
        }
    }

    pub fn acquire(&mut self, desc: TargetDesc) -> B::Target {
        let target = self.backend.acquire_temporary(desc);
        self.live.push(target);
        target
    }

    /// Release a temporary before the scope ends so the pool can reuse it.
    pub fn release(&mut self, target: B::Target) {
        if let Some(index) = self.live.iter().position(|t| *t == target) {
            self.live.swap_remove(index);
            self.backend.release_temporary(target);
        }
    }

    /// The wrapped backend, for handing to code that opens its own scope.
    pub fn backend(&mut self) -> &mut B {
        &mut *self.backend
    }

    /// Number of temporaries currently held by this scope.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    pub fn describe(&self, target: B::Target) -> TargetDesc {
        self.backend.describe(target)
    }

    pub fn copy(&mut self, source: B::Target, dest: B::Target) {
        self.backend.copy(source, dest);
    }

    pub fn draw(
        &mut self,
        shader: &B::Shader,
        pass: u32,
        source: B::Target,
        dest: B::Target,
        bindings: PassBindings<'_, B::Target>,
    ) {
        self.backend.draw(shader, pass, source, dest, bindings);
    }
}

impl<B: RenderBackend + ?Sized> Drop for TemporaryScope<'_, B> {
    fn drop(&mut self) {
        for target in self.live.drain(..) {
            self.backend.release_temporary(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingBackend;

    fn desc() -> TargetDesc {
        TargetDesc::new(64, 32, TargetFormat::Rgba16Float)
    }

    #[test]
    fn half_never_reaches_zero() {
        let tiny = TargetDesc::new(1, 3, TargetFormat::Rgba8Unorm).half();
        assert_eq!((tiny.width, tiny.height), (1, 1));
        assert_eq!(desc().half(), TargetDesc::new(32, 16, TargetFormat::Rgba16Float));
    }

    #[test]
    fn scope_releases_everything_on_drop() {
        let mut backend = RecordingBackend::new();
        {
            let mut scope = TemporaryScope::new(&mut backend);
            let a = scope.acquire(desc());
            scope.acquire(desc().half());
            scope.release(a);
            scope.acquire(desc());
            assert_eq!(scope.live(), 2);
        }
        assert_eq!(backend.acquired(), 3);
        assert_eq!(backend.released(), 3);
        assert_eq!(backend.live_temporaries(), 0);
    }

    #[test]
    fn releasing_a_foreign_target_is_ignored() {
        let mut backend = RecordingBackend::new();
        let screen = backend.create_target(desc(), "screen");
        {
            let mut scope = TemporaryScope::new(&mut backend);
            scope.release(screen);
        }
        assert_eq!(backend.released(), 0);
    }
}
