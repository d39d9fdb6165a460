//! Dataset-wide driver: enumerates person directories and runs the quota
//! generator over each of them in turn.
//!
//! A failing person is recorded in the [`RunSummary`] and the run moves on to
//! the next one.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use facegen_augment::{
    DatasetError, DatasetResult, JpegDirectorySink, PersonReport, QuotaGenerator, SourcePool,
};
use walkdir::WalkDir;

use crate::config::GeneratorConfig;

/// A person directory found under the dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonDir {
    pub name: String,
    pub path: PathBuf,
}

/// Result of one person's pass.
#[derive(Debug)]
pub struct PersonOutcome {
    pub person: String,
    pub result: DatasetResult<PersonReport>,
}

/// What a run would do for one person, without writing anything.
#[derive(Debug)]
pub struct PersonPlan {
    pub person: String,
    /// Number of pool entries, or the reason the pool is unusable.
    pub sources: DatasetResult<usize>,
    pub planned_batches: usize,
}

/// Aggregate outcome of a dataset run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<PersonOutcome>,
}

impl RunSummary {
    pub fn persons(&self) -> usize {
        self.outcomes.len()
    }

    /// Persons whose quota was met.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Images written for fully processed persons.
    pub fn total_generated(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|report| report.generated)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DatasetError)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(e) => Some((o.person.as_str(), e)),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded() == self.persons()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Successfully processed: {}/{} persons",
            self.succeeded(),
            self.persons()
        )?;
        write!(f, "Total images generated: {}", self.total_generated())?;
        for (person, error) in self.failures() {
            write!(f, "\n  {person}: {error}")?;
        }
        Ok(())
    }
}

/// Runs the quota generator over every person of a dataset directory.
#[derive(Debug, Clone)]
pub struct DatasetRunner {
    config: GeneratorConfig,
    generator: QuotaGenerator,
}

impl DatasetRunner {
    pub fn new(config: GeneratorConfig) -> Self {
        let generator = config.generator();
        Self { config, generator }
    }

    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Person subdirectories of the dataset root, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::DatasetDirectoryNotFound`] if the root is not a
    /// directory and [`DatasetError::DirectoryReadFailed`] if it cannot be
    /// listed.
    pub fn person_dirs(&self) -> DatasetResult<Vec<PersonDir>> {
        let root = &self.config.dataset_path;
        if !root.is_dir() {
            return Err(DatasetError::DatasetDirectoryNotFound { path: root.clone() });
        }

        let mut persons = Vec::new();
        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| DatasetError::DirectoryReadFailed {
                path: root.clone(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.into_path();
            match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => persons.push(PersonDir {
                    name: name.to_owned(),
                    path: path.clone(),
                }),
                None => {
                    tracing::warn!(
                        path = %path.display(),
                        "skipping person directory with non UTF-8 name",
                    );
                }
            }
        }

        Ok(persons)
    }

    /// Generate images for every person, or only for `only` when non-empty.
    ///
    /// Per-person failures are recorded in the summary and never stop the
    /// run.
    ///
    /// # Errors
    ///
    /// Fails only when the dataset root itself cannot be listed.
    pub fn run(&self, only: &[String]) -> DatasetResult<RunSummary> {
        let persons = self.select(only)?;

        tracing::info!(
            dataset = %self.config.dataset_path.display(),
            persons = persons.len(),
            quota = self.config.quota,
            "starting dataset generation",
        );

        let mut summary = RunSummary::default();
        for person in persons {
            let (name, result) = match person {
                Ok(dir) => {
                    let result = self.generate_person(&dir.name, &dir.path);
                    (dir.name, result)
                }
                Err(missing) => {
                    let path = self.config.dataset_path.join(&missing);
                    (missing, Err(DatasetError::PersonNotFound { path }))
                }
            };

            if let Err(e) = &result {
                tracing::error!(person = %name, error = %e, "person skipped");
            }
            summary.outcomes.push(PersonOutcome {
                person: name,
                result,
            });
        }

        tracing::info!(
            succeeded = summary.succeeded(),
            persons = summary.persons(),
            generated = summary.total_generated(),
            "dataset generation finished",
        );
        Ok(summary)
    }

    /// Generate the quota for a single person directory.
    ///
    /// # Errors
    ///
    /// Returns the pool, decode or write error that stopped the pass.
    pub fn generate_person(&self, person: &str, dir: &Path) -> DatasetResult<PersonReport> {
        let pool = SourcePool::load(dir, &self.config.pool_options())?;
        let mut sink = JpegDirectorySink::new(dir, self.config.jpeg_quality);
        self.generator.generate(person, &pool, &mut sink)
    }

    /// Describe the run without decoding or writing any image.
    ///
    /// # Errors
    ///
    /// Fails only when the dataset root itself cannot be listed.
    pub fn plan(&self, only: &[String]) -> DatasetResult<Vec<PersonPlan>> {
        let planned_batches = self.generator.planned_batches();
        let plans = self
            .select(only)?
            .into_iter()
            .map(|person| match person {
                Ok(dir) => PersonPlan {
                    sources: SourcePool::load(&dir.path, &self.config.pool_options())
                        .map(|pool| pool.len()),
                    person: dir.name,
                    planned_batches,
                },
                Err(missing) => PersonPlan {
                    sources: Err(DatasetError::PersonNotFound {
                        path: self.config.dataset_path.join(&missing),
                    }),
                    person: missing,
                    planned_batches,
                },
            })
            .collect();
        Ok(plans)
    }

    /// Resolve the person filter; unknown names come back as `Err(name)`.
    fn select(&self, only: &[String]) -> DatasetResult<Vec<Result<PersonDir, String>>> {
        let persons = self.person_dirs()?;
        if only.is_empty() {
            return Ok(persons.into_iter().map(Ok).collect());
        }

        Ok(only
            .iter()
            .map(|wanted| {
                persons
                    .iter()
                    .find(|dir| &dir.name == wanted)
                    .cloned()
                    .ok_or_else(|| wanted.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use facegen_augment::NoiseSeed;
    use image::{ImageBuffer, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;

    fn create_test_image(path: &Path) {
        let image: RgbImage =
            ImageBuffer::from_fn(20, 16, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 50]));
        image.save(path).unwrap();
    }

    fn config(root: &Path, quota: usize) -> GeneratorConfig {
        GeneratorConfig {
            dataset_path: root.to_path_buf(),
            quota,
            noise_seed: NoiseSeed::Seeded(11),
            ..GeneratorConfig::default()
        }
    }

    /// alice: two good images, bob: nothing usable, carol: only corrupt files.
    fn sample_dataset() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let alice = root.join("alice");
        fs::create_dir(&alice).unwrap();
        create_test_image(&alice.join("front.jpg"));
        create_test_image(&alice.join("side.png"));

        let bob = root.join("bob");
        fs::create_dir(&bob).unwrap();
        fs::write(bob.join("notes.txt"), "no photos yet").unwrap();

        let carol = root.join("carol");
        fs::create_dir(&carol).unwrap();
        fs::write(carol.join("broken.jpg"), b"garbage").unwrap();

        fs::write(root.join("README.md"), "top-level file").unwrap();
        temp_dir
    }

    #[test]
    fn person_dirs_are_sorted_and_skip_files() {
        let dataset = sample_dataset();
        let runner = DatasetRunner::new(config(dataset.path(), 10));

        let names: Vec<String> = runner
            .person_dirs()
            .unwrap()
            .into_iter()
            .map(|dir| dir.name)
            .collect();

        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn person_dirs_skip_non_utf8_names() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let dataset = sample_dataset();
        fs::create_dir(dataset.path().join(OsStr::from_bytes(b"mal\xffory"))).unwrap();
        let runner = DatasetRunner::new(config(dataset.path(), 10));

        let names: Vec<String> = runner
            .person_dirs()
            .unwrap()
            .into_iter()
            .map(|dir| dir.name)
            .collect();

        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn run_isolates_person_failures() {
        let dataset = sample_dataset();
        let runner = DatasetRunner::new(config(dataset.path(), 40));

        let summary = runner.run(&[]).unwrap();

        assert_eq!(summary.persons(), 3);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.total_generated(), 40);
        assert!(!summary.is_complete());

        let failures: Vec<_> = summary.failures().collect();
        assert!(matches!(failures[0], ("bob", DatasetError::EmptyPool { .. })));
        assert!(matches!(
            failures[1],
            ("carol", DatasetError::NoDecodableSource { .. })
        ));

        let alice = dataset.path().join("alice");
        assert!(alice.join("alice_0001.jpg").exists());
        assert!(alice.join("alice_0040.jpg").exists());
        assert!(!alice.join("alice_0041.jpg").exists());
        assert!(alice.join("front.jpg").exists());
    }

    #[test]
    fn summary_text_reports_counts() {
        let dataset = sample_dataset();
        let runner = DatasetRunner::new(config(dataset.path(), 5));

        let text = runner.run(&[]).unwrap().to_string();

        assert!(text.starts_with("Successfully processed: 1/3 persons\nTotal images generated: 5"));
        assert!(text.contains("bob: No source images found in"));
    }

    #[test]
    fn filter_runs_named_persons_only() {
        let dataset = sample_dataset();
        let runner = DatasetRunner::new(config(dataset.path(), 3));

        let summary = runner
            .run(&["alice".to_owned(), "zoe".to_owned()])
            .unwrap();

        assert_eq!(summary.persons(), 2);
        assert_eq!(summary.succeeded(), 1);
        assert!(matches!(
            summary.failures().next(),
            Some(("zoe", DatasetError::PersonNotFound { .. }))
        ));
        assert!(!dataset.path().join("carol").join("carol_0001.jpg").exists());
    }

    #[test]
    fn rerun_without_generated_sources_keeps_pool_small() {
        let dataset = sample_dataset();
        let mut config = config(dataset.path(), 35);
        DatasetRunner::new(config.clone()).run(&["alice".to_owned()]).unwrap();

        config.include_generated = false;
        let plans = DatasetRunner::new(config.clone()).plan(&["alice".to_owned()]).unwrap();
        assert_eq!(*plans[0].sources.as_ref().unwrap(), 2);

        config.include_generated = true;
        let plans = DatasetRunner::new(config).plan(&["alice".to_owned()]).unwrap();
        assert_eq!(*plans[0].sources.as_ref().unwrap(), 37);
    }

    #[test]
    fn plan_reports_pool_sizes_without_writing() {
        let dataset = sample_dataset();
        let runner = DatasetRunner::new(config(dataset.path(), 500));

        let plans = runner.plan(&[]).unwrap();

        assert_eq!(plans.len(), 3);
        assert_eq!(*plans[0].sources.as_ref().unwrap(), 2);
        assert_eq!(plans[0].planned_batches, 17);
        assert!(matches!(plans[1].sources, Err(DatasetError::EmptyPool { .. })));
        assert_eq!(*plans[2].sources.as_ref().unwrap(), 1);
        assert!(!dataset.path().join("alice").join("alice_0001.jpg").exists());
    }

    #[test]
    fn missing_dataset_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let runner = DatasetRunner::new(config(&temp_dir.path().join("nope"), 10));

        assert!(matches!(
            runner.run(&[]),
            Err(DatasetError::DatasetDirectoryNotFound { .. })
        ));
    }
}
