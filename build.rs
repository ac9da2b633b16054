#[cfg(feature = "bioformats")]
use j4rs::{JvmBuilder, MavenArtifact, MavenArtifactRepo, MavenSettings, errors::J4RsError};
#[cfg(feature = "bioformats")]
use retry::{delay, delay::Exponential, retry};
use std::error::Error;
#[cfg(feature = "bioformats")]
use std::fmt::{Display, Formatter};
#[cfg(feature = "bioformats")]
use std::path::PathBuf;
#[cfg(feature = "bioformats")]
use std::{env, fs};

#[cfg(feature = "bioformats")]
#[derive(Clone, Debug)]
enum BuildError {
    BioFormatsNotDownloaded,
}

#[cfg(feature = "bioformats")]
impl Display for BuildError {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(fmt, "Bioformats package not downloaded")
    }
}

#[cfg(feature = "bioformats")]
impl Error for BuildError {}

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo::rerun-if-changed=build.rs");

    #[cfg(feature = "bioformats")]
    {
        if env::var("DOCS_RS").is_err() {
            retry(
                Exponential::from_millis(1000).map(delay::jitter).take(4),
                deploy_java_artifacts,
            )?;
            let path = jassets_path()?;
            if !path.join("bioformats_package-8.3.0.jar").exists() {
                Err(BuildError::BioFormatsNotDownloaded)?;
            }
        }
    }

    Ok(())
}

#[cfg(feature = "bioformats")]
fn jassets_path() -> Result<PathBuf, J4RsError> {
    let mut start_path = fs::canonicalize(PathBuf::from(env::var("OUT_DIR")?))?;
    while start_path.pop() {
        for entry in fs::read_dir(&start_path)? {
            let path = entry?.path();
            if path.file_name().map(|x| x == "jassets").unwrap_or(false) {
                return Ok(path);
            }
        }
    }
    Err(J4RsError::GeneralError(
        "Can not find jassets directory".to_owned(),
    ))
}

#[cfg(feature = "bioformats")]
fn deploy_java_artifacts() -> Result<(), J4RsError> {
    let jvm = JvmBuilder::new()
        .skip_setting_native_lib()
        .with_maven_settings(MavenSettings::new(vec![MavenArtifactRepo::from(
            "openmicroscopy::https://artifacts.openmicroscopy.org/artifactory/ome.releases",
        )]))
        .build()?;

    jvm.deploy_artifact(&MavenArtifact::from("ome:bioformats_package:8.3.0"))?;

    #[cfg(feature = "gpl-formats")]
    jvm.deploy_artifact(&MavenArtifact::from("ome:formats-gpl:8.3.0"))?;

    Ok(())
}
