use ndarray::ArrayView3;

/// One decoded picture: tightly packed, row-major pixel bytes.
///
/// Frames are immutable once produced. Ownership moves from the decode
/// source into the reader's buffer and from there to the caller of
/// [`BatchReader::get`](crate::reader::batch_reader::BatchReader::get).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the frame, handing back the pixel buffer without copying.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Presentation index assigned by the decode source, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Zero-copy `(height, width, channels)` view of the pixels.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }
}
