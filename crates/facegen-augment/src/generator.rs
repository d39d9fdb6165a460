//! Quota-driven generation for one person.
//!
//! The generator walks the source pool cyclically, expands every decodable
//! source through the [`TransformPipeline`] and hands each result to an
//! [`ImageSink`] until exactly `quota` images have been emitted. A source
//! batch is cut short when the quota is reached in the middle of it.

use crate::{
    augmentation::TransformPipeline,
    error::{DatasetError, DatasetResult},
    pool::SourcePool,
    sink::{AugmentedImage, ImageSink},
};

/// Default number of images generated per person.
pub const DEFAULT_QUOTA: usize = 500;
/// Default number of images between two progress messages.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

/// Outcome of one person's generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonReport {
    pub person: String,
    /// Images handed to the sink; equals the quota on success.
    pub generated: usize,
    /// Decode attempts that failed and were skipped.
    pub decode_failures: usize,
    /// Source batches started, including a truncated final one.
    pub batches: usize,
    /// Batches started per pool position.
    pub batches_per_source: Vec<usize>,
    /// Images emitted per pool position.
    pub images_per_source: Vec<usize>,
}

impl PersonReport {
    fn new(person: &str, pool_len: usize) -> Self {
        Self {
            person: person.to_owned(),
            generated: 0,
            decode_failures: 0,
            batches: 0,
            batches_per_source: vec![0; pool_len],
            images_per_source: vec![0; pool_len],
        }
    }
}

/// Produces a fixed number of augmented images from a source pool
#[derive(Debug, Clone)]
pub struct QuotaGenerator {
    pipeline: TransformPipeline,
    quota: usize,
    progress_interval: usize,
}

impl QuotaGenerator {
    pub fn new(pipeline: TransformPipeline, quota: usize) -> Self {
        Self {
            pipeline,
            quota,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Log progress every `interval` images (at least 1).
    #[must_use]
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub const fn quota(&self) -> usize {
        self.quota
    }

    /// Number of source batches a pass starts when every source decodes.
    pub fn planned_batches(&self) -> usize {
        self.quota.div_ceil(self.pipeline.variants().len().max(1))
    }

    /// Generate exactly `quota` images of `person` from `pool` into `sink`.
    ///
    /// Unreadable sources are skipped without counting towards the quota.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::NoDecodableSource`] once a full wraparound of
    /// the pool fails to decode, and propagates the first sink error.
    pub fn generate<S>(
        &self,
        person: &str,
        pool: &SourcePool,
        sink: &mut S,
    ) -> DatasetResult<PersonReport>
    where
        S: ImageSink + ?Sized,
    {
        let mut report = PersonReport::new(person, pool.len());
        let mut pointer = 0;
        let mut consecutive_failures = 0;

        tracing::info!(
            person,
            sources = pool.len(),
            quota = self.quota,
            "generating images",
        );

        while report.generated < self.quota {
            let source = pool.cycle_index(pointer);
            pointer += 1;

            let image = match pool.decode(source) {
                Ok(image) => image,
                Err(error) => {
                    report.decode_failures += 1;
                    consecutive_failures += 1;
                    tracing::warn!(person, error = %error, "skipping unreadable source");

                    if consecutive_failures >= pool.len() {
                        return Err(DatasetError::NoDecodableSource {
                            path: pool.dir().to_path_buf(),
                            attempted: consecutive_failures,
                        });
                    }
                    continue;
                }
            };
            consecutive_failures = 0;
            report.batches += 1;
            report.batches_per_source[source] += 1;

            let remaining = self.quota - report.generated;
            for (position, (variant, augmented)) in
                self.pipeline.iter(&image).enumerate().take(remaining)
            {
                report.generated += 1;
                tracing::trace!(
                    person,
                    index = report.generated,
                    source,
                    variant = variant.category(),
                    "augmented",
                );
                let augmented = AugmentedImage {
                    index: report.generated,
                    source,
                    position,
                    variant,
                    image: augmented,
                };
                sink.persist(person, &augmented)?;
                report.images_per_source[source] += 1;

                if report.generated % self.progress_interval == 0 {
                    tracing::info!(
                        person,
                        generated = report.generated,
                        quota = self.quota,
                        "progress",
                    );
                }
            }
        }

        tracing::info!(
            person,
            generated = report.generated,
            skipped = report.decode_failures,
            "generation finished",
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use image::{ImageBuffer, Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        augmentation::{NoiseSeed, Variant},
        pool::PoolOptions,
        sink::JpegDirectorySink,
    };

    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        index: usize,
        source: usize,
        position: usize,
        variant: Variant,
        dimensions: (u32, u32),
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Vec<Record>,
    }

    impl ImageSink for RecordingSink {
        fn persist(&mut self, _person: &str, augmented: &AugmentedImage) -> DatasetResult<()> {
            self.records.push(Record {
                index: augmented.index,
                source: augmented.source,
                position: augmented.position,
                variant: augmented.variant,
                dimensions: augmented.image.dimensions(),
            });
            Ok(())
        }
    }

    struct FailingSink;

    impl ImageSink for FailingSink {
        fn persist(&mut self, _person: &str, augmented: &AugmentedImage) -> DatasetResult<()> {
            Err(DatasetError::ImageSaveFailed {
                path: format!("out_{}.jpg", augmented.index).into(),
                source: image::ImageError::IoError(std::io::Error::other("disk full")),
            })
        }
    }

    fn create_test_image(path: &Path, width: u32, height: u32) {
        let image: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 20) as u8, (y * 20) as u8, 100])
        });
        image.save(path).unwrap();
    }

    fn corrupt(path: &Path) {
        fs::write(path, b"\xff\xd8 truncated").unwrap();
    }

    fn generator(quota: usize) -> QuotaGenerator {
        QuotaGenerator::new(TransformPipeline::new(NoiseSeed::Seeded(3)), quota)
    }

    fn load(dir: &Path) -> SourcePool {
        SourcePool::load(dir, &PoolOptions::default()).unwrap()
    }

    #[test]
    fn three_sources_fill_quota_of_ninety_in_pool_order() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("a.jpg"), 8, 8);
        create_test_image(&temp_dir.path().join("b.jpg"), 10, 6);
        create_test_image(&temp_dir.path().join("c.jpg"), 12, 4);
        let pool = load(temp_dir.path());
        let mut sink = RecordingSink::default();

        let report = generator(90).generate("grace", &pool, &mut sink).unwrap();

        assert_eq!(report.generated, 90);
        assert_eq!(report.images_per_source, [30, 30, 30]);
        assert_eq!(sink.records.len(), 90);
        for (i, record) in sink.records.iter().enumerate() {
            assert_eq!(record.index, i + 1);
            assert_eq!(record.source, i / 30);
            assert_eq!(record.position, i % 30);
        }
        assert!(sink.records[..30].iter().all(|r| r.dimensions == (8, 8)));
        assert!(sink.records[30..60].iter().all(|r| r.dimensions == (10, 6)));
        assert!(sink.records[60..].iter().all(|r| r.dimensions == (12, 4)));
    }

    #[test]
    fn quota_smaller_than_batch_truncates_second_pass() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("only.png"), 9, 9);
        let pool = load(temp_dir.path());
        let mut sink = RecordingSink::default();

        let report = generator(35).generate("heidi", &pool, &mut sink).unwrap();

        assert_eq!(report.generated, 35);
        assert_eq!(report.batches, 2);
        assert_eq!(report.batches_per_source, [2]);

        let variants = pool_variants();
        let tail: Vec<_> = sink.records[30..].iter().map(|r| (r.position, r.variant)).collect();
        let expected: Vec<_> = variants[..5].iter().copied().enumerate().collect();
        assert_eq!(tail, expected);
        assert_eq!(sink.records.last().unwrap().index, 35);
    }

    fn pool_variants() -> Vec<Variant> {
        TransformPipeline::default().variants().to_vec()
    }

    #[test]
    fn corrupt_source_does_not_count() {
        let temp_dir = TempDir::new().unwrap();
        corrupt(&temp_dir.path().join("a_broken.jpg"));
        create_test_image(&temp_dir.path().join("b_fine.jpg"), 6, 6);
        let pool = load(temp_dir.path());
        let mut sink = RecordingSink::default();

        let report = generator(100).generate("ivan", &pool, &mut sink).unwrap();

        assert_eq!(report.generated, 100);
        assert_eq!(report.decode_failures, 4);
        assert_eq!(report.images_per_source, [0, 100]);
        assert_eq!(
            sink.records.iter().map(|r| r.index).collect::<Vec<_>>(),
            (1..=100).collect::<Vec<_>>()
        );
    }

    #[test]
    fn all_corrupt_pool_fails_after_one_wraparound() {
        let temp_dir = TempDir::new().unwrap();
        corrupt(&temp_dir.path().join("one.jpg"));
        corrupt(&temp_dir.path().join("two.jpeg"));
        corrupt(&temp_dir.path().join("three.png"));
        let pool = load(temp_dir.path());
        let mut sink = RecordingSink::default();

        let result = generator(500).generate("judy", &pool, &mut sink);

        assert!(matches!(
            result,
            Err(DatasetError::NoDecodableSource { attempted: 3, .. })
        ));
        assert!(sink.records.is_empty());
    }

    #[test]
    fn exact_multiple_stops_before_next_source() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("a.jpg"), 5, 5);
        corrupt(&temp_dir.path().join("b.jpg"));
        let pool = load(temp_dir.path());
        let mut sink = RecordingSink::default();

        let report = generator(30).generate("ken", &pool, &mut sink).unwrap();

        assert_eq!(report.generated, 30);
        assert_eq!(report.decode_failures, 0);
        assert_eq!(report.batches, 1);
    }

    #[test]
    fn every_source_is_visited_at_least_floor_times() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("a.jpg"), 4, 4);
        create_test_image(&temp_dir.path().join("b.jpg"), 4, 4);
        let pool = load(temp_dir.path());
        let mut sink = RecordingSink::default();
        let quota = 130;

        let report = generator(quota).generate("leo", &pool, &mut sink).unwrap();

        let floor = quota / (pool.len() * TransformPipeline::BATCH_LEN);
        assert!(report.batches_per_source.iter().all(|&visits| visits >= floor));
        assert_eq!(report.batches_per_source, [3, 2]);
    }

    #[test]
    fn sink_errors_abort_the_pass() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("a.jpg"), 4, 4);
        let pool = load(temp_dir.path());

        let result = generator(10).generate("mia", &pool, &mut FailingSink);

        assert!(matches!(result, Err(DatasetError::ImageSaveFailed { .. })));
    }

    #[test]
    fn writes_contiguous_jpeg_files() {
        let temp_dir = TempDir::new().unwrap();
        let person_dir = temp_dir.path().join("nina");
        fs::create_dir(&person_dir).unwrap();
        create_test_image(&person_dir.join("one.jpg"), 24, 18);
        create_test_image(&person_dir.join("two.png"), 24, 18);
        let pool = load(&person_dir);
        let mut sink = JpegDirectorySink::new(&person_dir, 90);

        let report = generator(45).generate("nina", &pool, &mut sink).unwrap();

        assert_eq!(report.generated, 45);
        for index in 1..=45 {
            let path = sink.output_path("nina", index);
            let written = image::open(&path).unwrap().into_rgb8();
            assert_eq!(written.dimensions(), (24, 18));
        }
        assert!(!sink.output_path("nina", 46).exists());
        assert!(person_dir.join("one.jpg").exists());
        assert!(person_dir.join("two.png").exists());
    }

    #[test]
    fn planned_batches_rounds_up() {
        assert_eq!(generator(500).planned_batches(), 17);
        assert_eq!(generator(90).planned_batches(), 3);
        assert_eq!(generator(1).planned_batches(), 1);
    }
}
