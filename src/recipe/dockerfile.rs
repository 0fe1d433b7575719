// src/recipe/dockerfile.rs

//! Dockerfile rendering for rpmbuild images
//!
//! The Dockerfile is a pure function of the recipe: it never touches the
//! filesystem, and every path it mentions is a basename relative to the
//! build context.
//!
//! Docker's `ADD` unpacks local tar archives into directories. A source
//! staged with `ADD` may therefore land as a directory; each source is
//! followed by a step that re-packs such a directory into a gzipped tarball
//! under its original name, so rpmbuild always finds a regular file.

use super::{basename, RecipeDescriptor, RecipeMode};

/// rpmbuild's `%_topdir` inside the image
pub const RPMBUILD_TOPDIR: &str = "/rpmbuild/build";

/// Owner applied to every staged file
const STAGED_OWNER: &str = "root:root";

/// Mode-specific Dockerfile inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerfileMode {
    Build {
        spec: String,
        macrofiles: Vec<String>,
        defines: Vec<String>,
        retrieve: bool,
    },
    Rebuild {
        srpm: String,
    },
}

/// Everything the Dockerfile depends on, with paths reduced to basenames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileInput {
    pub image: String,
    pub sources: Vec<String>,
    pub has_sources_dir: bool,
    pub mode: DockerfileMode,
}

impl DockerfileInput {
    pub fn from_recipe(recipe: &RecipeDescriptor) -> Self {
        let mode = match recipe.mode() {
            RecipeMode::Build {
                spec,
                macrofiles,
                defines,
                retrieve,
            } => DockerfileMode::Build {
                spec: basename(spec),
                macrofiles: macrofiles.iter().map(|m| basename(m)).collect(),
                defines: defines.clone(),
                retrieve: *retrieve,
            },
            RecipeMode::Rebuild { srpm } => DockerfileMode::Rebuild {
                srpm: basename(srpm),
            },
        };

        Self {
            image: recipe.image().to_string(),
            sources: recipe.sources().iter().map(|s| basename(s)).collect(),
            has_sources_dir: recipe.sources_dir().is_some(),
            mode,
        }
    }
}

/// Render the Dockerfile text
pub fn render_dockerfile(input: &DockerfileInput) -> String {
    let sources_dir = format!("{}/SOURCES", RPMBUILD_TOPDIR);
    let specs_dir = format!("{}/SPECS", RPMBUILD_TOPDIR);
    let srpms_dir = format!("{}/SRPMS", RPMBUILD_TOPDIR);

    let mut lines = vec![
        format!("FROM {}", input.image),
        String::new(),
        "RUN yum -y install rpmdevtools yum-utils tar".to_string(),
        "RUN rpmdev-setuptree".to_string(),
        String::new(),
        format!(
            "RUN sed -i 's/%_topdir.*/%_topdir {}/g' $HOME/.rpmmacros",
            RPMBUILD_TOPDIR.replace('/', "\\/")
        ),
        String::new(),
    ];

    if input.has_sources_dir {
        lines.push(format!("ADD SOURCES {}", sources_dir));
    }

    for source in &input.sources {
        lines.push(format!("ADD {source} {sources_dir}/{source}"));
        lines.push(format!(
            "RUN cd {sources_dir}; if [ -d {source} ]; then mv {source} {source}.tmp; \
             tar -C {source}.tmp -czvf {source} .; rm -r {source}.tmp; fi"
        ));
        lines.push(format!("RUN chown -R {} {}", STAGED_OWNER, sources_dir));
    }

    match &input.mode {
        DockerfileMode::Build {
            spec,
            macrofiles,
            defines,
            retrieve,
        } => {
            for macrofile in macrofiles {
                lines.push(format!("ADD {macrofile} {specs_dir}/{macrofile}"));
            }
            lines.push(format!("ADD {spec} {specs_dir}/{spec}"));
            lines.push(format!("RUN chown -R {} {}", STAGED_OWNER, specs_dir));
            if *retrieve {
                lines.push(format!("RUN spectool -g -R -A {specs_dir}/{spec}"));
            }
            lines.push(format!("RUN yum-builddep -y {specs_dir}/{spec}"));

            let mut cmd = "CMD rpmbuild".to_string();
            for define in defines {
                cmd.push_str(&format!(" --define '{}'", define));
            }
            cmd.push_str(&format!(" -ba {specs_dir}/{spec}"));
            lines.push(cmd);
        }
        DockerfileMode::Rebuild { srpm } => {
            lines.push(format!("ADD {srpm} {srpms_dir}/{srpm}"));
            lines.push(format!("RUN chown -R {} {}", STAGED_OWNER, srpms_dir));
            lines.push(format!("CMD rpmbuild --rebuild {srpms_dir}/{srpm}"));
        }
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
