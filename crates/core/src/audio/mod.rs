use std::{fmt, path::Path, sync::Arc};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, Device, FromSample, Sample, SampleRate, SizedSample, Stream, StreamConfig,
};
use crossbeam_channel::{Receiver, Sender};

use crate::{ClackError, Result};

/// File names looked up by [`SoundBank::load_dir`].
pub const ACCENT_FILE: &str = "hi.wav";
pub const NORMAL_FILE: &str = "lo.wav";

/// The two sounds a metronome can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    Normal,
    /// First beat of every measure.
    Accent,
}

impl Sound {
    pub fn for_beat(beat: u32) -> Self {
        if beat == 0 {
            Self::Accent
        } else {
            Self::Normal
        }
    }

    /// Buffer slot of the sound: 0 for normal, 1 for accent.
    pub fn index(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::Accent => 1,
        }
    }
}

/// Sample layout of decoded buffers and of the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decoded, immutable tick sounds.
///
/// Buffers hold interleaved `f32` samples and are shared with the audio
/// callback; every playback reads them from the start.
#[derive(Clone)]
pub struct SoundBank {
    format: BufferFormat,
    buffers: [Arc<[f32]>; 2],
}

impl SoundBank {
    /// Decodes both files up front. The accent file's format becomes the
    /// output format.
    pub fn load(accent: &Path, normal: &Path) -> Result<Self> {
        let (format, accent_samples) = decode_wav(accent)?;
        let (normal_format, normal_samples) = decode_wav(normal)?;

        if normal_format != format {
            tracing::warn!(
                path = %normal.display(),
                ?format,
                ?normal_format,
                "sound format differs from the output format"
            );
        }

        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "decoded tick sounds"
        );
        Ok(Self::from_samples(format, accent_samples, normal_samples))
    }

    /// Loads [`ACCENT_FILE`] and [`NORMAL_FILE`] from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(ACCENT_FILE), &dir.join(NORMAL_FILE))
    }

    pub fn from_samples(format: BufferFormat, accent: Vec<f32>, normal: Vec<f32>) -> Self {
        Self {
            format,
            buffers: [normal.into(), accent.into()],
        }
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    pub fn buffer(&self, sound: Sound) -> &Arc<[f32]> {
        &self.buffers[sound.index()]
    }
}

impl fmt::Debug for SoundBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundBank")
            .field("format", &self.format)
            .field("normal", &self.buffers[0].len())
            .field("accent", &self.buffers[1].len())
            .finish()
    }
}

fn decode_wav(path: &Path) -> Result<(BufferFormat, Vec<f32>)> {
    let reader = hound::WavReader::open(path).map_err(|err| ClackError::asset(path, err))?;
    let spec = reader.spec();

    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect()
        }
    };
    let samples = samples.map_err(|err| ClackError::asset(path, err))?;

    if samples.is_empty() {
        return Err(ClackError::asset(path, "file contains no samples"));
    }

    let format = BufferFormat {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    };
    Ok((format, samples))
}

/// Sink for metronome ticks. Implementations must not block.
pub trait TickPlayer {
    /// Starts an independent playback of `sound` from its first sample.
    fn play_tick(&mut self, sound: Sound);

    /// Cuts off every sound that is still playing.
    fn silence(&mut self);
}

impl<T: TickPlayer + ?Sized> TickPlayer for &mut T {
    fn play_tick(&mut self, sound: Sound) {
        (**self).play_tick(sound);
    }

    fn silence(&mut self) {
        (**self).silence();
    }
}

enum MixerMessage {
    Play(Arc<[f32]>),
    Silence,
}

struct Voice {
    buffer: Arc<[f32]>,
    cursor: usize,
}

/// Runs inside the device callback and sums the active voices.
struct Mixer {
    voices: Vec<Voice>,
    messages: Receiver<MixerMessage>,
}

impl Mixer {
    fn new(messages: Receiver<MixerMessage>) -> Self {
        Self {
            voices: Vec::with_capacity(8),
            messages,
        }
    }

    fn fill(&mut self, out: &mut [f32]) {
        while let Ok(message) = self.messages.try_recv() {
            match message {
                MixerMessage::Play(buffer) => self.voices.push(Voice { buffer, cursor: 0 }),
                MixerMessage::Silence => self.voices.clear(),
            }
        }

        out.fill(0.0);
        for voice in &mut self.voices {
            let remaining = &voice.buffer[voice.cursor..];
            for (sample, value) in out.iter_mut().zip(remaining) {
                *sample += value;
            }
            voice.cursor += remaining.len().min(out.len());
        }
        self.voices.retain(|voice| voice.cursor < voice.buffer.len());

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

/// Default output device playing a [`SoundBank`].
pub struct AudioEngine {
    bank: SoundBank,
    sender: Sender<MixerMessage>,
    _stream: Stream,
}

impl AudioEngine {
    /// Opens the default output device in the bank's format and starts the
    /// stream. Nothing is audible until [`TickPlayer::play_tick`].
    pub fn open(bank: SoundBank) -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| ClackError::DeviceInit("no output device available".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|err| ClackError::DeviceInit(err.to_string()))?;

        let format = bank.format();
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let (sender, receiver) = crossbeam_channel::unbounded();
        let mixer = Mixer::new(receiver);

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer),
            other => Err(ClackError::DeviceInit(format!(
                "unsupported device sample format {other}"
            ))),
        }?;
        stream
            .play()
            .map_err(|err| ClackError::DeviceInit(err.to_string()))?;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "audio output started"
        );

        Ok(Self {
            bank,
            sender,
            _stream: stream,
        })
    }

    fn send(&self, message: MixerMessage) {
        if self.sender.send(message).is_err() {
            tracing::warn!("audio callback is gone, dropping request");
        }
    }
}

impl TickPlayer for AudioEngine {
    fn play_tick(&mut self, sound: Sound) {
        self.send(MixerMessage::Play(self.bank.buffer(sound).clone()));
    }

    fn silence(&mut self) {
        self.send(MixerMessage::Silence);
    }
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("bank", &self.bank)
            .finish()
    }
}

fn build_stream<T>(device: &Device, config: &StreamConfig, mut mixer: Mixer) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.fill(&mut scratch);
                for (out, sample) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample(*sample);
                }
            },
            |err| tracing::error!("audio stream error: {err}"),
            None,
        )
        .map_err(|err| ClackError::DeviceInit(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: hound::WavSpec, samples: &[f32]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            match spec.sample_format {
                hound::SampleFormat::Float => writer.write_sample(sample).unwrap(),
                hound::SampleFormat::Int => writer
                    .write_sample((sample * i16::MAX as f32) as i16)
                    .unwrap(),
            }
        }
        writer.finalize().unwrap();
    }

    fn int_spec(sample_rate: u32, channels: u16) -> hound::WavSpec {
        hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn accent_is_only_the_first_beat() {
        assert_eq!(Sound::for_beat(0), Sound::Accent);
        assert_eq!(Sound::for_beat(1), Sound::Normal);
        assert_eq!(Sound::for_beat(11), Sound::Normal);
        assert_eq!(Sound::Accent.index(), 1);
        assert_eq!(Sound::Normal.index(), 0);
    }

    #[test]
    fn loads_and_normalises_both_sounds() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join(ACCENT_FILE), int_spec(44_100, 2), &[0.5, -0.5, 0.25, 0.0]);
        let float_spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        write_wav(&dir.path().join(NORMAL_FILE), float_spec, &[0.1, 0.2, 0.3]);

        let bank = SoundBank::load_dir(dir.path()).unwrap();
        assert_eq!(
            bank.format(),
            BufferFormat {
                sample_rate: 44_100,
                channels: 2
            }
        );

        let accent = bank.buffer(Sound::Accent);
        assert_eq!(accent.len(), 4);
        assert!((accent[0] - 0.5).abs() < 1e-3);
        assert!((accent[1] + 0.5).abs() < 1e-3);
        assert_eq!(&bank.buffer(Sound::Normal)[..], &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn missing_asset_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join(ACCENT_FILE), int_spec(44_100, 1), &[0.5]);

        let err = SoundBank::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ClackError::AudioAsset { ref path, .. } if path.ends_with(NORMAL_FILE)));
    }

    #[test]
    fn garbage_asset_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let accent = dir.path().join(ACCENT_FILE);
        std::fs::write(&accent, b"definitely not a riff header").unwrap();
        write_wav(&dir.path().join(NORMAL_FILE), int_spec(44_100, 1), &[0.5]);

        let err = SoundBank::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ClackError::AudioAsset { .. }));
        assert!(err.to_string().contains(ACCENT_FILE));
    }

    #[test]
    fn bundled_sounds_decode() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../static");
        let bank = SoundBank::load_dir(&dir).unwrap();

        assert_eq!(bank.format().channels, 1);
        assert!(!bank.buffer(Sound::Accent).is_empty());
        assert_ne!(bank.buffer(Sound::Accent), bank.buffer(Sound::Normal));
    }

    #[test]
    fn mixer_replays_buffers_from_the_start() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut mixer = Mixer::new(receiver);
        let click: Arc<[f32]> = vec![0.25, 0.5, 0.75].into();

        sender.send(MixerMessage::Play(click.clone())).unwrap();
        let mut out = [1.0; 2];
        mixer.fill(&mut out);
        assert_eq!(out, [0.25, 0.5]);

        // Second voice starts at sample 0 while the first one finishes.
        sender.send(MixerMessage::Play(click.clone())).unwrap();
        let mut out = [0.0; 4];
        mixer.fill(&mut out);
        assert_eq!(out, [1.0, 0.5, 0.75, 0.0]);
        assert!(mixer.voices.is_empty());
        assert_eq!(&click[..], &[0.25, 0.5, 0.75]);
    }

    #[test]
    fn mixer_silence_drops_active_voices() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut mixer = Mixer::new(receiver);
        sender.send(MixerMessage::Play(vec![0.5; 16].into())).unwrap();

        let mut out = [0.0; 4];
        mixer.fill(&mut out);
        assert_eq!(mixer.voices.len(), 1);

        sender.send(MixerMessage::Silence).unwrap();
        mixer.fill(&mut out);
        assert_eq!(out, [0.0; 4]);
        assert!(mixer.voices.is_empty());
    }
}
