// ABOUTME: Manifest resolution and engine-wide settings.
// ABOUTME: Variables, templating, env overlays, inheritance and the typed service model.

mod conditional;
mod duration;
mod merge;
mod resolver;
mod service;
mod settings;
mod template;
mod vars;

pub use conditional::apply_env_overlays;
pub use duration::{InvalidDuration, parse_duration};
pub use merge::{ExtendRef, FieldFilter, NEVER_INHERITED, inherit, overlay};
pub use resolver::{MANIFEST_FILENAME, ResolveOptions, Resolver};
pub use service::{
    BuildContext, BuildSpec, Command, Config, ExternalVolume, LoggingConfig, Service, VolumeSpec,
    label_text,
};
pub use settings::{Frontend, NetworkSettings, SETTINGS_ENV, SETTINGS_PATH, Settings};
pub use template::{Interpolator, TemplateRenderer, interpolate};
pub use vars::{VariableProvider, Vars, parse_env};
