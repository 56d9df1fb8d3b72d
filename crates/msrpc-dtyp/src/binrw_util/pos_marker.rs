use std::cell::Cell;
use std::fmt::Debug;
use std::io::SeekFrom;

use binrw::{BinRead, BinResult, BinWrite, Endian};

/// Remembers the stream position of a value, so it can be patched after
/// the rest of the structure has been written (lengths, offsets).
#[derive(Default)]
pub struct PosMarker<T> {
    pub pos: Cell<u64>,
    pub value: T,
}

impl<T> PosMarker<T> {
    pub fn new(value: T) -> Self {
        Self {
            pos: Cell::new(u64::MAX),
            value,
        }
    }
}

impl<T: Debug> Debug for PosMarker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosMarker")
            .field("pos", &self.pos.get())
            .field("value", &self.value)
            .finish()
    }
}

impl<T> BinRead for PosMarker<T>
where
    T: BinRead,
{
    type Args<'a> = T::Args<'a>;

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        T::read_options(reader, endian, args).map(|value| Self {
            pos: Cell::new(pos),
            value,
        })
    }
}

impl<T> BinWrite for PosMarker<T>
where
    T: BinWrite<Args<'static> = ()> + Default,
{
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.pos.set(writer.stream_position()?);
        T::default().write_options(writer, endian, args)
    }
}

impl<T> PosMarker<T>
where
    T: BinWrite<Args<'static> = ()> + TryFrom<u64>,
{
    /// Writes the distance between `base` and the current position into `this`.
    ///
    /// Use as a `write_with` on a trailing `()` field, once everything
    /// the size covers has been written.
    pub fn write_roff_b<W, B>(
        _value: &(),
        writer: &mut W,
        endian: Endian,
        (this, base): (&Self, &PosMarker<B>),
    ) -> BinResult<()>
    where
        W: std::io::Write + std::io::Seek,
    {
        let end = writer.stream_position()?;
        let size = end - base.pos.get();
        let size = T::try_from(size).map_err(|_| binrw::Error::AssertFail {
            pos: this.pos.get(),
            message: format!("Relative offset {size} does not fit the marker type"),
        })?;

        writer.seek(SeekFrom::Start(this.pos.get()))?;
        size.write_options(writer, endian, ())?;
        writer.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::prelude::*;

    #[binrw::binrw]
    #[derive(Debug, PartialEq, Eq)]
    #[brw(little)]
    struct Framed {
        #[bw(calc = PosMarker::default())]
        #[br(temp)]
        _start: PosMarker<()>,
        magic: u8,
        #[bw(calc = PosMarker::default())]
        #[br(temp)]
        _size: PosMarker<u16>,
        #[br(count = (_size.value - 3) as usize)]
        body: Vec<u8>,
        #[bw(write_with = PosMarker::write_roff_b, args(&_size, &_start))]
        _write_size: (),
    }

    #[test]
    fn test_pos_marker_writes_size() {
        let value = Framed {
            magic: 0xaa,
            body: vec![1, 2, 3, 4],
            _write_size: (),
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        value.write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner(), [0xaa, 0x07, 0x00, 1, 2, 3, 4]);
    }

    #[test]
    fn test_pos_marker_records_read_position() {
        let mut cursor = std::io::Cursor::new([0xaa, 0x05, 0x00, 9, 9]);
        let value = Framed::read(&mut cursor).unwrap();
        assert_eq!(value.body, [9, 9]);
    }
}
