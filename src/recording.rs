//! In-memory [`RenderBackend`] that records every pass instead of rendering.
//!
//! Target contents are strings describing how they were produced, so tests
//! can assert both the pass sequence and that a copy is bit-identical.

use std::collections::HashMap;

use crate::backend::{PassBindings, RenderBackend, ShaderLibrary, TargetDesc};

enum Op {
    Copy,
    Draw {
        shader: String,
        pass: u32,
        uniforms: Vec<u8>,
    },
}

struct Slot {
    desc: TargetDesc,
    content: String,
    temporary: bool,
    live: bool,
}

pub struct RecordingBackend {
    slots: Vec<Slot>,
    ops: Vec<Op>,
    acquired: usize,
    released: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            ops: Vec::new(),
            acquired: 0,
            released: 0,
        }
    }

    /// Allocate a persistent target holding `content`.
    pub fn create_target(&mut self, desc: TargetDesc, content: &str) -> u32 {
        self.slots.push(Slot {
            desc,
            content: content.to_string(),
            temporary: false,
            live: true,
        });
        (self.slots.len() - 1) as u32
    }

    pub fn content(&self, target: u32) -> &str {
        &self.slots[target as usize].content
    }

    /// `(shader, pass)` of every draw, in order.
    pub fn passes(&self) -> Vec<(String, u32)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Draw { shader, pass, .. } => Some((shader.clone(), *pass)),
                Op::Copy => None,
            })
            .collect()
    }

    /// Uniform bytes of every draw with pass index `pass`.
    pub fn uniforms_of(&self, pass: u32) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Draw {
                    pass: p, uniforms, ..
                } if *p == pass => Some(uniforms.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn acquired(&self) -> usize {
        self.acquired
    }

    pub fn released(&self) -> usize {
        self.released
    }

    pub fn live_temporaries(&self) -> usize {
        self.slots.iter().filter(|s| s.temporary && s.live).count()
    }

    fn check_live(&self, target: u32) {
        assert!(
            self.slots[target as usize].live,
            "target {} used after release",
            target
        );
    }
}

impl RenderBackend for RecordingBackend {
    type Target = u32;
    type Shader = String;

    fn describe(&self, target: u32) -> TargetDesc {
        self.slots[target as usize].desc
    }

    fn acquire_temporary(&mut self, desc: TargetDesc) -> u32 {
        self.acquired += 1;
        self.slots.push(Slot {
            desc,
            content: String::new(),
            temporary: true,
            live: true,
        });
        (self.slots.len() - 1) as u32
    }

    fn release_temporary(&mut self, target: u32) {
        let slot = &mut self.slots[target as usize];
        assert!(slot.temporary, "released a target that was never acquired");
        assert!(slot.live, "target {} released twice", target);
        slot.live = false;
        self.released += 1;
    }

    fn copy(&mut self, source: u32, dest: u32) {
        self.check_live(source);
        self.check_live(dest);
        let content = self.slots[source as usize].content.clone();
        self.slots[dest as usize].content = content;
        self.ops.push(Op::Copy);
    }

    fn draw(
        &mut self,
        shader: &String,
        pass: u32,
        source: u32,
        dest: u32,
        bindings: PassBindings<'_, u32>,
    ) {
        assert_ne!(source, dest, "pass {} reads and writes the same target", pass);
        self.check_live(source);
        self.check_live(dest);
        for aux in bindings.aux.iter().flatten() {
            self.check_live(*aux);
        }
        let content = format!("{}#{}({})", shader, pass, self.slots[source as usize].content);
        self.slots[dest as usize].content = content;
        self.ops.push(Op::Draw {
            shader: shader.clone(),
            pass,
            uniforms: bindings.uniforms.to_vec(),
        });
    }
}

/// Shader library over a fixed name set, for wiring effects without a backend.
pub struct Shaders(pub HashMap<&'static str, String>);

impl Shaders {
    pub fn of(names: &[&'static str]) -> Self {
        Self(names.iter().map(|n| (*n, n.to_string())).collect())
    }
}

impl ShaderLibrary<String> for Shaders {
    fn shader(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}
