//! Offline backend: a headless `AudioBackend` with a real (if naive) render
//! pass. Node and trigger operations are id bookkeeping plus logging, which
//! is enough to drive the runtime end to end without a synthesis engine.

use std::collections::HashSet;
use std::sync::Mutex;

use solstice_types::Note;

use crate::backend::{
    AudioBackend, BackendError, BackendResult, NodeId, NodeSpec, RenderOptions,
    DESTINATION_NODE,
};
use crate::buffers::AudioBuffer;

pub struct OfflineBackend {
    nodes: Mutex<HashSet<NodeId>>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(HashSet::new()),
        }
    }

    fn check_node(&self, node_id: NodeId) -> BackendResult {
        if node_id == DESTINATION_NODE || self.nodes.lock().unwrap().contains(&node_id) {
            Ok(())
        } else {
            Err(BackendError(format!("unknown node {node_id}")))
        }
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn create_node(&self, node_id: NodeId, spec: &NodeSpec) -> BackendResult {
        let mut nodes = self.nodes.lock().unwrap();
        if !nodes.insert(node_id) {
            return Err(BackendError(format!("node {node_id} already exists")));
        }
        log::debug!(target: "audio::offline", "create {} node {}", spec.kind(), node_id);
        Ok(())
    }

    fn connect(&self, source: NodeId, dest: NodeId) -> BackendResult {
        self.check_node(source)?;
        self.check_node(dest)?;
        log::debug!(target: "audio::offline", "connect {} -> {}", source, dest);
        Ok(())
    }

    fn free_node(&self, node_id: NodeId) -> BackendResult {
        if !self.nodes.lock().unwrap().remove(&node_id) {
            return Err(BackendError(format!("unknown node {node_id}")));
        }
        log::debug!(target: "audio::offline", "free node {}", node_id);
        Ok(())
    }

    fn trigger_attack(
        &self,
        node_id: NodeId,
        note: Note,
        at: f64,
        _velocity: f32,
    ) -> BackendResult {
        self.check_node(node_id)?;
        log::info!(target: "audio::offline", "[{:8.2}] node {} attack {}", at, node_id, note);
        Ok(())
    }

    fn trigger_attack_release(
        &self,
        node_id: NodeId,
        note: Note,
        at: f64,
        duration: f64,
    ) -> BackendResult {
        self.check_node(node_id)?;
        log::info!(
            target: "audio::offline",
            "[{:8.2}] node {} attack {} for {:.2}s", at, node_id, note, duration
        );
        Ok(())
    }

    fn release_all(&self, node_id: NodeId, at: f64) -> BackendResult {
        self.check_node(node_id)?;
        log::debug!(target: "audio::offline", "[{:8.2}] node {} release all", at, node_id);
        Ok(())
    }

    fn render(
        &self,
        source: &AudioBuffer,
        chain: &[NodeSpec],
        options: &RenderOptions,
    ) -> BackendResult<AudioBuffer> {
        let rate =
            (options.pitch_shift as f64 / 12.0).exp2() * options.source_options.playback_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(BackendError(format!("invalid playback rate {rate}")));
        }

        let mut frames: Vec<f32> = if (rate - 1.0).abs() < f64::EPSILON {
            source.frames().to_vec()
        } else {
            // Nearest-sample resample: a rate of 2.0 halves the length and
            // raises pitch an octave.
            let out_len = (source.len() as f64 / rate) as usize;
            (0..out_len)
                .map(|i| {
                    let src = (i as f64 * rate) as usize;
                    source.frames().get(src).copied().unwrap_or(0.0)
                })
                .collect()
        };
        if options.reverse {
            frames.reverse();
        }
        let tail = (options.additional_render_length.max(0.0)
            * source.sample_rate() as f64) as usize;
        frames.extend(std::iter::repeat(0.0).take(tail));

        log::debug!(
            target: "audio::offline",
            "rendered {} frames through {} chain nodes", frames.len(), chain.len()
        );
        Ok(AudioBuffer::new(source.sample_rate(), frames))
    }
}
