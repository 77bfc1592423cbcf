use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::debug;

use super::{AudioError, DecodedSample, SampleBank, SampleName};
use crate::config::AudioConfig;

/// Background fetch-and-decode of the sample set.
///
/// The worker thread reports exactly once; the mixer polls without blocking.
pub struct SampleLoader {
    result_rx: Receiver<Result<SampleBank, AudioError>>,
}

impl SampleLoader {
    /// Start loading every sample named in `config` on a worker thread.
    pub fn spawn<F>(config: &AudioConfig, decode: F) -> Self
    where
        F: Fn(Vec<u8>) -> Result<DecodedSample, AudioError> + Send + 'static,
    {
        let sources: Vec<(SampleName, PathBuf)> = SampleName::ALL
            .iter()
            .map(|&name| (name, config.sample_path(name)))
            .collect();
        Self::spawn_sources(sources, decode)
    }

    pub fn spawn_sources<F>(sources: Vec<(SampleName, PathBuf)>, decode: F) -> Self
    where
        F: Fn(Vec<u8>) -> Result<DecodedSample, AudioError> + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let worker_tx = result_tx.clone();

        let spawned = thread::Builder::new()
            .name("sample-loader".to_string())
            .spawn(move || {
                let result = load_all(&sources, &decode);
                // The receiver is gone if the session already ended.
                let _ = worker_tx.send(result);
            });

        if let Err(error) = spawned {
            let _ = result_tx.send(Err(AudioError::Device(format!(
                "could not start loader thread: {error}"
            ))));
        }

        Self { result_rx }
    }

    /// A loader whose outcome is already known.
    pub fn finished(result: Result<SampleBank, AudioError>) -> Self {
        let (result_tx, result_rx) = mpsc::channel();
        let _ = result_tx.send(result);
        Self { result_rx }
    }

    /// `None` while still loading.
    pub fn poll(&mut self) -> Option<Result<SampleBank, AudioError>> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AudioError::LoaderGone)),
        }
    }
}

/// Read and decode every source. The first failure aborts the whole set.
pub fn load_all<F>(sources: &[(SampleName, PathBuf)], decode: &F) -> Result<SampleBank, AudioError>
where
    F: Fn(Vec<u8>) -> Result<DecodedSample, AudioError>,
{
    let mut bank = SampleBank::default();
    for (name, path) in sources {
        let bytes = std::fs::read(path).map_err(|source| AudioError::Sample {
            name: *name,
            source: Box::new(AudioError::Io {
                path: path.clone(),
                source,
            }),
        })?;
        let sample = decode(bytes).map_err(|source| AudioError::Sample {
            name: *name,
            source: Box::new(source),
        })?;
        debug!(
            sample = %name,
            seconds = sample.duration_secs(),
            "decoded sample"
        );
        bank.insert(*name, sample);
    }
    Ok(bank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gearshift-loader-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fake_decode(bytes: Vec<u8>) -> Result<DecodedSample, AudioError> {
        if bytes.starts_with(b"PCM") {
            Ok(DecodedSample::new(1, 100, vec![0.0; bytes.len()]))
        } else {
            Err(AudioError::Decode("unsupported format".to_string()))
        }
    }

    fn wait(loader: &mut SampleLoader) -> Result<SampleBank, AudioError> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = loader.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "loader never reported");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loads_every_sample_in_the_background() {
        let dir = scratch_dir("ok");
        let mut config = AudioConfig::default();
        config.asset_dir = dir.clone();
        for name in SampleName::ALL {
            std::fs::write(config.sample_path(name), b"PCM-data").unwrap();
        }

        let mut loader = SampleLoader::spawn(&config, fake_decode);
        let bank = wait(&mut loader).unwrap();
        assert_eq!(bank.len(), SampleName::ALL.len());
        assert_eq!(bank.get(SampleName::Crash).unwrap().samples.len(), 8);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_asset_fails_the_whole_set() {
        let dir = scratch_dir("missing");
        let mut config = AudioConfig::default();
        config.asset_dir = dir.clone();
        std::fs::write(config.sample_path(SampleName::EngineIdle), b"PCM").unwrap();

        let mut loader = SampleLoader::spawn(&config, fake_decode);
        let error = wait(&mut loader).unwrap_err();
        assert!(matches!(
            error,
            AudioError::Sample {
                name: SampleName::EngineLow,
                ..
            }
        ));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn undecodable_asset_fails() {
        let dir = scratch_dir("garbage");
        let path = dir.join("gear_shift.wav");
        std::fs::write(&path, b"garbage").unwrap();

        let result = load_all(&[(SampleName::GearShift, path)], &fake_decode);
        match result {
            Err(AudioError::Sample { name, source }) => {
                assert_eq!(name, SampleName::GearShift);
                assert!(matches!(*source, AudioError::Decode(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn finished_loader_reports_immediately_then_disconnects() {
        let mut loader = SampleLoader::finished(Ok(SampleBank::default()));
        assert!(matches!(loader.poll(), Some(Ok(_))));
        assert!(matches!(loader.poll(), Some(Err(AudioError::LoaderGone))));
    }
}
