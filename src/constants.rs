// src/constants.rs

/// The chart metadata document (`name`, `version`).
pub const METADATA_FILENAME: &str = "metadata.yaml";

/// The chart's default template values.
pub const VALUES_FILENAME: &str = "values.yaml";

/// The chart's optional default runtime options.
pub const RUNTIME_FILENAME: &str = "runtime.yaml";

/// The subtree rendered through the template engine.
pub const TEMPLATES_DIR: &str = "templates";

/// The subtree copied verbatim into the execution directory.
pub const STATIC_DIR: &str = "static";

/// Label of the synthetic result recorded when a global pre hook fails.
pub const GLOBAL_PRE_RUN: &str = "global-pre-run";

/// Label of the synthetic result recorded when a global post hook fails.
pub const GLOBAL_POST_RUN: &str = "global-post-run";

/// Prefix for scratch execution directories.
pub const SCRATCH_PREFIX: &str = "charty-";

/// Name of the directory holding charty's user configuration (under the system config dir).
pub const CONFIG_DIR_NAME: &str = "charty";

/// The user configuration file (inside the config dir).
pub const CONFIG_FILENAME: &str = "config.toml";

/// Extension of packaged charts.
pub const PACKAGE_EXTENSION: &str = "tar.gz";
