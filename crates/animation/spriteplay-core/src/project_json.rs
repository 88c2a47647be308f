use crate::data::{AnimRef, ProjectData};
use crate::error::EvalError;
use crate::runtime::validate;

/// Public API: parse a JSON-authored project (see `fixtures/`) into [`ProjectData`].
///
/// Notes:
/// - The JSON shape is the serde form of the data model; attribute keys are
///   `{"attr": "position_x", "value": 1.0}` objects and curves are tagged by `kind`.
/// - Every animation is validated the same way `play` validates it: parent
///   ordering, strictly increasing key frames, frame window, and instance nesting.
pub fn parse_project_json(s: &str) -> Result<ProjectData, EvalError> {
    let project: ProjectData = serde_json::from_str(s)?;
    for pack in &project.packs {
        for animation in &pack.animations {
            validate(&project, AnimRef { pack, animation })?;
        }
    }
    Ok(project)
}
