use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;

use crate::shared::constants::RGB_CHANNELS;
use crate::shared::frame::Frame;
use crate::shared::source::Source;
use crate::video::domain::decode_source::{DecodeSource, SourceError};

/// `AV_TIME_BASE`: container durations are expressed in microseconds.
const CONTAINER_TIME_BASE: f64 = 1_000_000.0;

/// Decodes frames via ffmpeg-next (libavformat + libavcodec), one per call.
///
/// Accepts files, network URIs and, on Linux (`v4l2`) and macOS
/// (`avfoundation`), capture devices by index. Every frame is converted
/// to tightly packed RGB24.
pub struct FfmpegSource {
    state: Option<DecodeState>,
}

// Safety: FfmpegSource is moved into the producer thread and used only
// there. The raw pointers inside ffmpeg types are never shared.
unsafe impl Send for FfmpegSource {}

struct DecodeState {
    ictx: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    fps: Option<f64>,
    frame_count: Option<u64>,
    next_index: usize,
    flushing: bool,
    done: bool,
}

impl FfmpegSource {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeSource for FfmpegSource {
    fn open(&mut self, source: &Source) -> Result<(), SourceError> {
        self.release();
        ffmpeg_next::init()?;

        let ictx = open_input(source)?;

        let (video_stream_index, parameters, fps, frame_count) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or("No video stream found")?;
            let fps = rational_to_f64(stream.avg_frame_rate())
                .or_else(|| rational_to_f64(stream.rate()));
            let frame_count = match stream.frames() {
                n if n > 0 => Some(n as u64),
                _ => estimate_frame_count(&stream, ictx.duration(), fps),
            };
            (stream.index(), stream.parameters(), fps, frame_count)
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(parameters)?;
        let decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        log::debug!(
            "Opened {source}: {width}x{height}, fps={fps:?}, frames={frame_count:?}"
        );

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
            fps,
            frame_count,
            next_index: 0,
            flushing: false,
            done: false,
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }

    fn read_next(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(state) = self.state.as_mut() else {
            return Err("FfmpegSource: not opened".into());
        };
        state.next_frame()
    }

    fn release(&mut self) {
        self.state = None;
    }

    fn fps(&self) -> Option<f64> {
        self.state.as_ref().and_then(|s| s.fps)
    }

    fn frame_count(&self) -> Option<u64> {
        self.state.as_ref().and_then(|s| s.frame_count)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|s| (s.width, s.height))
    }
}

impl DecodeState {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.done {
            return Ok(None);
        }

        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }

        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(Some(frame));
                }
                self.done = true;
                return Ok(None);
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            // Corrupt packets are skipped; the decoder resyncs on the next one.
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable packet: {e}");
                continue;
            }

            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;

        let pixels = pack_rows(&rgb, self.width, self.height);
        let frame = Frame::new(
            pixels,
            self.width,
            self.height,
            RGB_CHANNELS,
            self.next_index,
        );
        self.next_index += 1;
        Ok(Some(frame))
    }
}

fn open_input(source: &Source) -> Result<Input, SourceError> {
    match source {
        Source::Path(path) => Ok(ffmpeg_next::format::input(path)?),
        Source::Device(index) => open_device(*index),
    }
}

fn open_device(index: u32) -> Result<Input, SourceError> {
    let (format_name, url) =
        device_locator(index).ok_or("capture devices are not supported on this platform")?;

    ffmpeg_next::device::register_all();
    let format = find_device_format(format_name)
        .ok_or_else(|| format!("input device format {format_name} is unavailable"))?;

    let ctx = ffmpeg_next::format::open_with(&url, &format, ffmpeg_next::Dictionary::new())?;
    match ctx {
        ffmpeg_next::format::context::Context::Input(input) => Ok(input),
        _ => Err(format!("{url} did not open as an input").into()),
    }
}

/// Looks up a registered video capture input by name.
///
/// The device iterator yields a null format once the list is exhausted
/// (or immediately when no backend is compiled in), so the search stops
/// there instead of dereferencing it.
fn find_device_format(name: &str) -> Option<ffmpeg_next::format::Format> {
    ffmpeg_next::device::input::video()
        .take_while(is_registered)
        .find(|f| f.name() == name)
}

fn is_registered(format: &ffmpeg_next::format::Format) -> bool {
    // Safety: only the pointer value is inspected, never dereferenced.
    match format {
        ffmpeg_next::format::Format::Input(input) => unsafe { !input.as_ptr().is_null() },
        ffmpeg_next::format::Format::Output(output) => unsafe { !output.as_ptr().is_null() },
    }
}

/// Maps a device index to the platform's capture input and its URL.
fn device_locator(index: u32) -> Option<(&'static str, String)> {
    if cfg!(target_os = "linux") {
        Some(("v4l2", format!("/dev/video{index}")))
    } else if cfg!(target_os = "macos") {
        Some(("avfoundation", index.to_string()))
    } else {
        None
    }
}

fn rational_to_f64(rate: ffmpeg_next::Rational) -> Option<f64> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    Some(rate.numerator() as f64 / rate.denominator() as f64)
}

/// Estimates the frame count from the stream (or container) duration when
/// the container does not record it.
fn estimate_frame_count(
    stream: &ffmpeg_next::format::stream::Stream,
    container_duration: i64,
    fps: Option<f64>,
) -> Option<u64> {
    let fps = fps?;
    let seconds = if stream.duration() > 0 {
        let tb = stream.time_base();
        if tb.denominator() == 0 {
            return None;
        }
        stream.duration() as f64 * tb.numerator() as f64 / tb.denominator() as f64
    } else if container_duration > 0 {
        container_duration as f64 / CONTAINER_TIME_BASE
    } else {
        return None;
    };
    let estimate = (seconds * fps).round();
    (estimate >= 1.0).then_some(estimate as u64)
}

/// Copies an RGB24 frame into a contiguous buffer, dropping row padding
/// (ffmpeg strides are often wider than `width * 3`).
fn pack_rows(rgb: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * RGB_CHANNELS as usize;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::{Path, PathBuf};

    /// Encodes `num_frames` flat grey MPEG-4 frames into `path`.
    pub(crate) fn write_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: i32) {
        use ffmpeg_next::{codec, encoder, format, Packet, Rational};

        ffmpeg_next::init().unwrap();
        let mut octx = format::output(path).unwrap();
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let codec = encoder::find(codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        enc.set_width(width);
        enc.set_height(height);
        enc.set_format(format::Pixel::YUV420P);
        enc.set_time_base(Rational(1, fps));
        enc.set_frame_rate(Some(Rational(fps, 1)));
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let mut enc = enc.open_with(ffmpeg_next::Dictionary::new()).unwrap();
        ost.set_parameters(&enc);
        octx.write_header().unwrap();
        let out_tb = octx.stream(0).unwrap().time_base();

        let drain = |enc: &mut encoder::video::Encoder, octx: &mut format::context::Output| {
            let mut packet = Packet::empty();
            while enc.receive_packet(&mut packet).is_ok() {
                packet.set_stream(0);
                packet.rescale_ts(Rational(1, fps), out_tb);
                packet.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut yuv = ffmpeg_next::util::frame::video::Video::new(
                format::Pixel::YUV420P,
                width,
                height,
            );
            let luma = 16 + ((i * 30) % 200) as u8;
            yuv.data_mut(0).fill(luma);
            yuv.data_mut(1).fill(128);
            yuv.data_mut(2).fill(128);
            yuv.set_pts(Some(i as i64));
            enc.send_frame(&yuv).unwrap();
            drain(&mut enc, &mut octx);
        }
        enc.send_eof().unwrap();
        drain(&mut enc, &mut octx);
        octx.write_trailer().unwrap();
    }

    fn video_path(dir: &Path) -> PathBuf {
        dir.join("clip.mp4")
    }

    #[test]
    fn test_open_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_path(dir.path());
        write_test_video(&path, 5, 64, 48, 25);

        let mut source = FfmpegSource::new();
        source.open(&Source::path(&path)).unwrap();
        assert!(source.is_open());
        assert_eq!(source.dimensions(), Some((64, 48)));
        assert_relative_eq!(source.fps().unwrap(), 25.0, epsilon = 0.01);
        assert_eq!(source.frame_count(), Some(5));
    }

    #[test]
    fn test_open_nonexistent_fails_and_stays_closed() {
        let mut source = FfmpegSource::new();
        let result = source.open(&Source::path("/nonexistent/clip.mp4"));
        assert!(result.is_err());
        assert!(!source.is_open());
        assert_eq!(source.fps(), None);
    }

    #[test]
    fn test_reads_frames_in_order_then_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_path(dir.path());
        write_test_video(&path, 6, 32, 32, 30);

        let mut source = FfmpegSource::new();
        source.open(&Source::path(&path)).unwrap();

        let mut indices = Vec::new();
        while let Some(frame) = source.read_next().unwrap() {
            assert_eq!(frame.width(), 32);
            assert_eq!(frame.height(), 32);
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 32 * 32 * 3);
            indices.push(frame.index());
        }
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        // End of stream is sticky.
        assert!(source.read_next().unwrap().is_none());
    }

    #[test]
    fn test_read_without_open_is_error() {
        let mut source = FfmpegSource::new();
        assert!(source.read_next().is_err());
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = video_path(dir.path());
        write_test_video(&path, 2, 16, 16, 10);

        let mut source = FfmpegSource::new();
        source.open(&Source::path(&path)).unwrap();
        source.release();
        source.release();
        assert!(!source.is_open());
        assert!(source.read_next().is_err());
    }

    #[test]
    fn test_device_locator_per_platform() {
        let located = device_locator(3);
        if cfg!(target_os = "linux") {
            assert_eq!(located, Some(("v4l2", "/dev/video3".to_string())));
        } else if cfg!(target_os = "macos") {
            assert_eq!(located, Some(("avfoundation", "3".to_string())));
        } else {
            assert_eq!(located, None);
        }
    }

    #[test]
    fn test_unknown_device_format_is_not_found() {
        ffmpeg_next::init().unwrap();
        ffmpeg_next::device::register_all();
        assert!(find_device_format("no-such-capture-backend").is_none());
    }

    #[test]
    fn test_absent_device_fails_and_stays_closed() {
        let mut source = FfmpegSource::new();
        assert!(source.open(&Source::device(4095)).is_err());
        assert!(!source.is_open());
    }

    #[test]
    fn test_rational_to_f64_rejects_zero() {
        assert_eq!(rational_to_f64(ffmpeg_next::Rational(0, 1)), None);
        assert_eq!(rational_to_f64(ffmpeg_next::Rational(30, 0)), None);
        assert_relative_eq!(
            rational_to_f64(ffmpeg_next::Rational(30000, 1001)).unwrap(),
            29.97,
            epsilon = 0.001
        );
    }
}
