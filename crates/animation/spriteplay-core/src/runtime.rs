//! Per-animation runtime: decoded tracks plus one cached nested runtime per
//! instance part.
//!
//! Evaluation order per call:
//! - sample every part's track at the (whole or fractional) frame
//! - resolve the hierarchy
//! - for each instance part advance its clock and evaluate the nested
//!   animation under the instance part's world context
//!
//! The `"pack/animation"` keys currently being evaluated are carried down the
//! recursion; an instance targeting one of them is a configuration error.

use hashbrown::HashSet;
use log::{debug, warn};

use crate::cells::CellTable;
use crate::clock::{validate_instance_key, InstanceClock};
use crate::config::EvalConfig;
use crate::data::{AnimRef, KeyValue, PartType, ProjectData};
use crate::error::{EvalError, ResourceKind};
use crate::event::EvalEvent;
use crate::hierarchy::{HierarchyResolver, ParentContext, Resolved};
use crate::state::{InstanceState, PartState};
use crate::track::{KeyframeTrack, TrackSample};

/// Shared state of one evaluation pass.
pub(crate) struct EvalScope<'s, 'a> {
    pub project: &'a ProjectData,
    pub cells: &'s CellTable<'a>,
    pub cfg: &'s EvalConfig,
    pub ancestors: Vec<String>,
    pub events: Vec<EvalEvent>,
    pub warnings: Vec<EvalError>,
    /// Instance events are only collected while playing forward.
    pub emit: bool,
}

impl<'s, 'a> EvalScope<'s, 'a> {
    pub fn new(
        project: &'a ProjectData,
        cells: &'s CellTable<'a>,
        cfg: &'s EvalConfig,
        emit: bool,
    ) -> Self {
        Self {
            project,
            cells,
            cfg,
            ancestors: Vec::new(),
            events: Vec::new(),
            warnings: Vec::new(),
            emit,
        }
    }
}

#[derive(Clone, Debug)]
struct InstanceSlot<'a> {
    clock: InstanceClock,
    runtime: Box<AnimRuntime<'a>>,
}

#[derive(Clone, Debug)]
pub(crate) struct AnimRuntime<'a> {
    anim: AnimRef<'a>,
    key: String,
    tracks: Vec<KeyframeTrack>,
    /// Animation each instance part plays; `None` for other part types.
    targets: Vec<Option<String>>,
    slots: Vec<Option<InstanceSlot<'a>>>,
}

/// Parent ordering, frame window and keyframe list count of one animation.
fn check_structure(anim: AnimRef<'_>, key: &str) -> Result<(), EvalError> {
    let parts = anim.parts();
    let animation = anim.animation;
    if animation.fps == 0 {
        return Err(EvalError::configuration(key, "fps must be positive"));
    }
    if animation.frame_count == 0 {
        return Err(EvalError::configuration(key, "animation has no frames"));
    }
    if animation.keyframes.len() > parts.len() {
        return Err(EvalError::structure(
            key,
            format!(
                "{} keyframe lists for {} parts",
                animation.keyframes.len(),
                parts.len()
            ),
        ));
    }
    for (index, part) in parts.iter().enumerate() {
        let p = part.parent_index;
        if p < -1 || p >= index as i32 {
            return Err(EvalError::structure(
                key,
                format!("part '{}' (#{index}) has parent index {p}", part.name),
            ));
        }
    }
    Ok(())
}

/// Validate `anim` and every animation reachable through its instance parts.
pub(crate) fn validate(project: &ProjectData, anim: AnimRef<'_>) -> Result<(), EvalError> {
    let mut ancestors = Vec::new();
    let mut done = HashSet::new();
    validate_inner(project, anim, &mut ancestors, &mut done)
}

/// Validate with an explicit chain of enclosing animation keys.
pub(crate) fn validate_under(
    project: &ProjectData,
    anim: AnimRef<'_>,
    ancestors: &[String],
) -> Result<(), EvalError> {
    let mut chain = ancestors.to_vec();
    let mut done = HashSet::new();
    validate_inner(project, anim, &mut chain, &mut done)
}

fn validate_inner(
    project: &ProjectData,
    anim: AnimRef<'_>,
    ancestors: &mut Vec<String>,
    done: &mut HashSet<String>,
) -> Result<(), EvalError> {
    let key = anim.key();
    if ancestors.contains(&key) {
        return Err(EvalError::configuration(
            ancestors.last().map(String::as_str).unwrap_or(key.as_str()),
            format!("instance nests '{key}' inside itself"),
        ));
    }
    if done.contains(&key) {
        return Ok(());
    }
    check_structure(anim, &key)?;

    // Keyframe order is checked by decoding; the tracks are dropped again.
    for (part, keys) in anim.parts().iter().zip(&anim.animation.keyframes) {
        KeyframeTrack::new(&key, &part.name, keys)?;
    }

    ancestors.push(key.clone());
    for (index, part) in anim.parts().iter().enumerate() {
        if part.part_type != PartType::Instance {
            continue;
        }
        let Some(target_name) = part.instance.as_ref().map(|r| r.animation.as_str()) else {
            continue;
        };
        // Unknown targets are reported per frame and only hide the part.
        let Some(target) = project.find_animation_from(Some(&anim.pack.name), target_name) else {
            continue;
        };
        validate_part_keys(anim, index, &key, target)?;
        validate_inner(project, target, ancestors, done)?;
    }
    ancestors.pop();
    done.insert(key);
    Ok(())
}

/// Check the default and every keyed instance parameter set of part `index`
/// against `target`.
fn validate_part_keys(
    anim: AnimRef<'_>,
    index: usize,
    owner: &str,
    target: AnimRef<'_>,
) -> Result<(), EvalError> {
    let instance = anim.parts().get(index).and_then(|p| p.instance.as_ref());
    if let Some(defaults) = instance.map(|r| r.defaults) {
        validate_instance_key(owner, target.animation, &defaults)?;
    }
    if let Some(keys) = anim.animation.keyframes.get(index) {
        for value in keys.iter().flat_map(|k| &k.values) {
            if let KeyValue::Instance(k) = value {
                validate_instance_key(owner, target.animation, k)?;
            }
        }
    }
    Ok(())
}

impl<'a> AnimRuntime<'a> {
    pub fn new(anim: AnimRef<'a>) -> Result<Self, EvalError> {
        let key = anim.key();
        check_structure(anim, &key)?;
        let parts = anim.parts();
        let mut tracks = Vec::with_capacity(parts.len());
        for (index, part) in parts.iter().enumerate() {
            let keys = anim
                .animation
                .keyframes
                .get(index)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            tracks.push(KeyframeTrack::new(&key, &part.name, keys)?);
        }
        let targets = parts
            .iter()
            .map(|p| match p.part_type {
                PartType::Instance => p.instance.as_ref().map(|r| r.animation.clone()),
                _ => None,
            })
            .collect();
        let slots = (0..parts.len()).map(|_| None).collect();
        Ok(Self {
            anim,
            key,
            tracks,
            targets,
            slots,
        })
    }

    #[inline]
    pub fn anim(&self) -> AnimRef<'a> {
        self.anim
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Drop every nested runtime; they are rebuilt on the next evaluation.
    pub fn reset_instances(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Point instance part `index` at another animation.
    pub fn retarget(
        &mut self,
        project: &ProjectData,
        index: usize,
        animation: &str,
    ) -> Result<(), EvalError> {
        let part = self
            .anim
            .parts()
            .get(index)
            .filter(|p| p.part_type == PartType::Instance)
            .ok_or_else(|| EvalError::resource(ResourceKind::Part, format!("#{index}")))?;
        let target = project
            .find_animation_from(Some(&self.anim.pack.name), animation)
            .ok_or_else(|| EvalError::resource(ResourceKind::Animation, animation))?;
        validate_under(project, target, std::slice::from_ref(&self.key))?;
        validate_part_keys(self.anim, index, &self.key, target)?;
        debug!(
            "{}: instance part '{}' now plays '{}'",
            self.key,
            part.name,
            target.key()
        );
        self.targets[index] = Some(animation.to_string());
        self.slots[index] = None;
        Ok(())
    }

    /// Sample, resolve and recurse into instance parts.
    pub fn evaluate(
        &mut self,
        frame: f32,
        delta: f32,
        parent: &ParentContext,
        hidden: &[bool],
        scope: &mut EvalScope<'_, 'a>,
    ) -> Result<Vec<PartState>, EvalError> {
        let sample_frame = if scope.cfg.sub_frame {
            frame
        } else {
            frame.floor()
        };
        let parts = self.anim.parts();
        let samples: Vec<TrackSample> = parts
            .iter()
            .zip(&self.tracks)
            .map(|(part, track)| {
                let mut defaults = part.defaults;
                if defaults.instance.is_none() {
                    defaults.instance = part.instance.as_ref().map(|r| r.defaults);
                }
                track.sample(&defaults, sample_frame)
            })
            .collect();

        let Resolved {
            mut states,
            contexts,
        } = HierarchyResolver::new(scope.cells, scope.cfg.content_scale)
            .with_hidden(hidden)
            .resolve(&self.key, parts, &samples, parent, &mut scope.warnings)?;

        scope.ancestors.push(self.key.clone());
        let result =
            self.evaluate_instances(&samples, &contexts, &mut states, sample_frame, delta, scope);
        scope.ancestors.pop();
        result?;
        Ok(states)
    }

    fn evaluate_instances(
        &mut self,
        samples: &[TrackSample],
        contexts: &[ParentContext],
        states: &mut [PartState],
        owner_frame: f32,
        delta: f32,
        scope: &mut EvalScope<'_, 'a>,
    ) -> Result<(), EvalError> {
        let parts = self.anim.parts();
        for (index, part) in parts.iter().enumerate() {
            if part.part_type != PartType::Instance {
                continue;
            }
            let Some(target_name) = self.targets[index].clone() else {
                continue;
            };
            let Some(target) = scope
                .project
                .find_animation_from(Some(&self.anim.pack.name), &target_name)
            else {
                let err = EvalError::resource(ResourceKind::Animation, target_name);
                warn!("{}: instance part '{}' hidden: {err}", self.key, part.name);
                scope.warnings.push(err);
                states[index].visible = false;
                self.slots[index] = None;
                continue;
            };
            let target_key = target.key();
            if scope.ancestors.contains(&target_key) {
                return Err(EvalError::configuration(
                    &self.key,
                    format!(
                        "instance part '{}' nests '{target_key}' inside itself",
                        part.name
                    ),
                ));
            }

            let sample = &samples[index];
            let instance_key = sample.attributes.instance.unwrap_or_default();
            let armed_at = sample.instance_frame.unwrap_or(0);
            let stale = match &self.slots[index] {
                Some(slot) => slot.runtime.key != target_key || slot.clock.armed_at() != armed_at,
                None => true,
            };
            if stale {
                let clock =
                    InstanceClock::new(&self.key, target.animation, &instance_key, armed_at)?;
                let runtime = AnimRuntime::new(target)?;
                debug!(
                    "{}: instance part '{}' armed on '{target_key}' at frame {armed_at}",
                    self.key, part.name
                );
                self.slots[index] = Some(InstanceSlot {
                    clock,
                    runtime: Box::new(runtime),
                });
            }
            let Some(slot) = self.slots[index].as_mut() else {
                continue;
            };

            let crossings = slot.clock.advance(owner_frame, delta);
            if scope.emit {
                let room = scope.cfg.max_events_per_tick.saturating_sub(scope.events.len());
                for loops in crossings.completed.take(room) {
                    scope.events.push(EvalEvent::InstanceLoopCompleted {
                        part: part.name.clone(),
                        animation: target_key.clone(),
                        loops,
                    });
                }
                if crossings.ended {
                    scope.events.push(EvalEvent::InstanceEnded {
                        part: part.name.clone(),
                        animation: target_key.clone(),
                    });
                }
            }

            let pos = slot.clock.position();
            let sub_frame = if scope.cfg.sub_frame {
                pos.exact
            } else {
                pos.frame as f32
            };
            let nested_delta = delta * slot.clock.speed();
            let nested = slot
                .runtime
                .evaluate(sub_frame, nested_delta, &contexts[index], &[], scope)?;
            states[index].instance = Some(Box::new(InstanceState {
                animation: target_key,
                frame: pos.frame,
                loops_completed: pos.pass,
                finished: pos.finished,
                parts: nested,
            }));
        }
        Ok(())
    }
}
