// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: base docker image
fn image_arg() -> Arg {
    Arg::new("image").help("Base docker image")
}

/// Common argument: output directory
fn output_arg() -> Arg {
    Arg::new("output")
        .long("output")
        .value_name("PATH")
        .help("Output directory for RPMs [default: .]")
}

/// Common arguments: docker connection overrides
fn docker_args() -> [Arg; 3] {
    [
        Arg::new("docker_base_url")
            .long("docker-base-url")
            .value_name("URL")
            .help("protocol+hostname+port towards docker (example: unix:///var/run/docker.sock)"),
        Arg::new("docker_timeout")
            .long("docker-timeout")
            .value_name("SECONDS")
            .help("HTTP request timeout in seconds towards the docker API [default: 600]"),
        Arg::new("docker_version")
            .long("docker-version")
            .value_name("VERSION")
            .help("API version the docker client will use (example: 1.41)"),
    ]
}

fn build_cli() -> Command {
    Command::new("docker-rpmbuild")
        .version(env!("CARGO_PKG_VERSION"))
        .author("docker-rpmbuild Contributors")
        .about("Build RPM packages inside disposable Docker images")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("build")
                .about("Build RPMs from a spec file and source tarballs")
                .args(docker_args())
                .arg(
                    Arg::new("define")
                        .long("define")
                        .value_name("OPTION")
                        .action(ArgAction::Append)
                        .help("Pass a macro to rpmbuild (repeatable)"),
                )
                .arg(
                    Arg::new("source")
                        .long("source")
                        .value_name("TARBALL")
                        .action(ArgAction::Append)
                        .help("Tarball containing package sources (repeatable)"),
                )
                .arg(
                    Arg::new("sources_dir")
                        .long("sources-dir")
                        .value_name("DIR")
                        .help("Directory containing resources required by the spec"),
                )
                .arg(
                    Arg::new("spec")
                        .long("spec")
                        .value_name("FILE")
                        .help("RPM spec file to build"),
                )
                .arg(
                    Arg::new("macrofile")
                        .long("macrofile")
                        .value_name("FILE")
                        .action(ArgAction::Append)
                        .help("Macro file placed next to the spec in SPECS/ (repeatable)"),
                )
                .arg(
                    Arg::new("retrieve")
                        .short('r')
                        .long("retrieve")
                        .action(ArgAction::SetTrue)
                        .help("Fetch resources defined in the spec with spectool inside the container"),
                )
                .arg(output_arg())
                .arg(image_arg()),
        )
        .subcommand(
            Command::new("rebuild")
                .about("Rebuild a source RPM")
                .args(docker_args())
                .arg(
                    Arg::new("srpm")
                        .long("srpm")
                        .value_name("FILE")
                        .help("SRPM to rebuild"),
                )
                .arg(output_arg())
                .arg(image_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("docker-rpmbuild.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
