//! Prerenderable buffers: the cache-consuming glue between pieces and the
//! offline rendering adapter.
//!
//! A piece that wants, say, "the piano played backwards through a big
//! reverb" describes the render once; the first activation computes it
//! note-by-note through the backend, later activations (and concurrent ones)
//! get the cached set. When the sample library already holds the rendered
//! instrument from a previous run, no render happens at all.

use solstice_types::Note;

use solstice_audio::{
    AudioBuffer, NodeSpec, RenderOptions, SampleMap, SampleSet, Sampler, SamplerOptions,
    SourceOptions,
};

use std::sync::Arc;

use crate::piece::PieceEnv;

/// Description of one prerendered instrument.
pub struct PrerenderSpec<'a> {
    /// Notes to render. Empty means "render every buffer in the source set
    /// unchanged in key" (for unpitched material).
    pub notes: &'a [Note],
    pub source_instrument: &'a str,
    /// Content identity: source + processing + parameters. The cache and
    /// the library key by this name.
    pub rendered_instrument: &'a str,
    /// Destination chain used only during the offline pass.
    pub chain: Vec<NodeSpec>,
    /// Extra seconds captured after each note, for reverb tails.
    pub additional_render_length: f64,
    /// Semitones applied on top of sample-to-note distance.
    pub pitch_shift: f32,
    pub reverse: bool,
    pub source_options: SourceOptions,
}

impl<'a> PrerenderSpec<'a> {
    pub fn new(
        notes: &'a [Note],
        source_instrument: &'a str,
        rendered_instrument: &'a str,
    ) -> Self {
        Self {
            notes,
            source_instrument,
            rendered_instrument,
            chain: Vec::new(),
            additional_render_length: 0.0,
            pitch_shift: 0.0,
            reverse: false,
            source_options: SourceOptions::default(),
        }
    }
}

/// Obtain the rendered buffer set for a spec, going through the shared
/// cache. `progress` receives a monotonically increasing fraction in [0,1]
/// across the note set.
pub fn prerenderable_buffers(
    env: &PieceEnv,
    samples: &SampleMap,
    spec: &PrerenderSpec<'_>,
    progress: &dyn Fn(f64),
) -> Result<Arc<SampleSet>, String> {
    // Already rendered in a previous run and shipped by the library.
    if let Some(set) = samples.get(spec.rendered_instrument) {
        progress(1.0);
        return Ok(Arc::new(set.clone()));
    }

    let source = samples
        .get(spec.source_instrument)
        .ok_or_else(|| {
            format!(
                "missing source instrument `{}` for `{}`",
                spec.source_instrument, spec.rendered_instrument
            )
        })?;

    env.cache.obtain(spec.rendered_instrument, || {
        let backend = env.engine.backend();
        let mut rendered = SampleSet::new();
        if spec.notes.is_empty() {
            let total = source.len().max(1);
            for (i, (key, buffer)) in source.iter().enumerate() {
                let out = backend
                    .render(buffer, &spec.chain, &render_options(spec, 0.0))
                    .map_err(|e| e.to_string())?;
                rendered.insert(key.to_string(), out);
                progress((i + 1) as f64 / total as f64);
            }
        } else {
            let total = spec.notes.len();
            for (i, &note) in spec.notes.iter().enumerate() {
                let (sampled, distance) = closest_sample(source, note)?;
                let out = backend
                    .render(sampled, &spec.chain, &render_options(spec, distance))
                    .map_err(|e| e.to_string())?;
                rendered.insert(note.to_string(), out);
                progress((i + 1) as f64 / total as f64);
            }
        }
        Ok(rendered)
    })
}

/// As [`prerenderable_buffers`], wrapping the result in a sampler node.
pub fn prerenderable_sampler(
    env: &PieceEnv,
    samples: &SampleMap,
    spec: &PrerenderSpec<'_>,
    options: SamplerOptions,
    progress: &dyn Fn(f64),
) -> Result<Sampler, String> {
    let buffers = prerenderable_buffers(env, samples, spec, progress)?;
    env.engine.sampler((*buffers).clone(), options)
}

fn render_options(spec: &PrerenderSpec<'_>, distance: f32) -> RenderOptions {
    RenderOptions {
        pitch_shift: spec.pitch_shift + distance,
        reverse: spec.reverse,
        additional_render_length: spec.additional_render_length,
        source_options: spec.source_options.clone(),
    }
}

/// The sampled note nearest the target, plus the semitone distance the
/// render must shift it by.
fn closest_sample(source: &SampleSet, target: Note) -> Result<(&AudioBuffer, f32), String> {
    source
        .notes()
        .min_by_key(|(note, _)| (note.midi() - target.midi()).abs())
        .map(|(note, buffer)| (buffer, (target.midi() - note.midi()) as f32))
        .ok_or_else(|| format!("no pitched samples available for {target}"))
}
