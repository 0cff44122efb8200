use std::fmt::Display;
use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::parse_file::read_file;
use crate::template::Template;

const MAKE: &str = include_str!("../templates/make.mk");
const MESON: &str = include_str!("../templates/meson.mk");

/// The build system the source list is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Make,
    Meson,
}

impl Layout {
    /// The layout selected by the command line flags. Make unless meson is asked for.
    pub fn from_flags(make: bool, meson: bool) -> Self {
        match (make, meson) {
            (false, true) => Layout::Meson,
            _ => Layout::Make,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Layout::Make => "make",
            Layout::Meson => "meson",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.mk", self.name())
    }

    fn builtin(self) -> &'static str {
        match self {
            Layout::Make => MAKE,
            Layout::Meson => MESON,
        }
    }

    /// The template for this layout, from `dir` when given, else the built-in one.
    pub fn template(self, dir: Option<&Path>) -> Result<Template> {
        match dir {
            Some(dir) => {
                let path = dir.join(self.file_name());
                debug!("loading template {}", path.display());
                Template::parse(&path.to_string_lossy(), &read_file(&path)?)
            }
            None => Template::parse(&self.file_name(), self.builtin()),
        }
    }
}

impl Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
