//! コンパクト辞書ファイルのセクション形式
//!
//! ```text
//! magic   "MinPhrRkyv 1\n" + 0xFF padding (16 bytes)
//! section len: u64 LE | reserved: u64 LE | payload | padding to 16 bytes
//! ```
//!
//! セクションはインデックス、デコーダーメタデータ、ターゲットフレーズストアの
//! 順に並びます。各ペイロードの先頭はファイル内で16バイト境界に揃うため、
//! メモリマップしたままrkyvアーカイブとしてアクセスできます。

use std::io::{self, Read, Write};

use rkyv::util::AlignedVec;

use crate::errors::{MinphrError, Result};
use crate::utils::padding_len;

/// minphr辞書ファイルを識別するマジックバイト。
///
/// フォーマットのバージョンはクレートのセマンティックバージョンから切り離されています。
pub const MODEL_MAGIC: &[u8] = b"MinPhrRkyv 1\n";

const MODEL_MAGIC_LEN: usize = MODEL_MAGIC.len();
const MAGIC_PADDING_LEN: usize = padding_len(MODEL_MAGIC_LEN);

/// セクションヘッダーの長さ(バイト)
pub(crate) const SECTION_HEADER_LEN: usize = 16;

/// `read_exact`を行い、入力の途中終了を[`MinphrError::InvalidFormat`]に変換します。
pub(crate) fn read_exact_or_truncated<R>(
    rdr: &mut R,
    buf: &mut [u8],
    section: &'static str,
) -> Result<()>
where
    R: Read,
{
    rdr.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MinphrError::invalid_format(section, "The section is truncated.")
        } else {
            MinphrError::from(e)
        }
    })
}

/// マジックバイトとパディングを書き込みます。
pub(crate) fn write_magic<W>(wtr: &mut W) -> Result<()>
where
    W: Write,
{
    wtr.write_all(MODEL_MAGIC)?;
    wtr.write_all(&[0xFF; MAGIC_PADDING_LEN])?;
    Ok(())
}

/// マジックバイトを読み取り、検証します。
pub(crate) fn read_magic<R>(rdr: &mut R) -> Result<()>
where
    R: Read,
{
    let mut magic = [0; MODEL_MAGIC_LEN + MAGIC_PADDING_LEN];
    read_exact_or_truncated(rdr, &mut magic, "magic")?;
    if !magic.starts_with(MODEL_MAGIC) {
        return Err(MinphrError::invalid_format(
            "magic",
            "The magic number of the input model mismatches.",
        ));
    }
    Ok(())
}

/// 長さ付きのセクションを書き込みます。
pub(crate) fn write_section<W>(wtr: &mut W, payload: &[u8]) -> Result<()>
where
    W: Write,
{
    wtr.write_all(&u64::try_from(payload.len())?.to_le_bytes())?;
    wtr.write_all(&0u64.to_le_bytes())?;
    wtr.write_all(payload)?;
    wtr.write_all(&vec![0; padding_len(payload.len())])?;
    Ok(())
}

/// セクションヘッダーを読み取り、ペイロード長を返します。
///
/// 長さがゼロのセクションは空のコンポーネントとしてエラーになります。
pub(crate) fn read_section_len<R>(rdr: &mut R, section: &'static str) -> Result<usize>
where
    R: Read,
{
    let mut header = [0; SECTION_HEADER_LEN];
    read_exact_or_truncated(rdr, &mut header, section)?;
    let mut len = [0; 8];
    len.copy_from_slice(&header[..8]);
    let len = usize::try_from(u64::from_le_bytes(len))?;
    if len == 0 {
        return Err(MinphrError::invalid_format(section, "The section is empty."));
    }
    Ok(len)
}

/// 一度に読み込むバイト数
const READ_CHUNK_LEN: usize = 1 << 16;

/// ペイロードを16バイト境界に揃ったバッファに読み込みます。
///
/// `len`はファイルのヘッダーから来るため、実際に読めたバイト数に応じてバッファを
/// 伸ばします。入力が`len`より短い場合は確保済みの分だけで
/// [`MinphrError::InvalidFormat`]になります。
pub(crate) fn read_aligned<R>(rdr: &mut R, len: usize, section: &'static str) -> Result<AlignedVec>
where
    R: Read,
{
    let mut buf: AlignedVec = AlignedVec::with_capacity(len.min(READ_CHUNK_LEN));
    let mut chunk = [0; READ_CHUNK_LEN];
    while buf.len() < len {
        let n = (len - buf.len()).min(READ_CHUNK_LEN);
        read_exact_or_truncated(rdr, &mut chunk[..n], section)?;
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(buf)
}

/// ペイロードに続くパディングを読み飛ばします。
pub(crate) fn skip_padding<R>(rdr: &mut R, len: usize, section: &'static str) -> Result<()>
where
    R: Read,
{
    let mut padding = [0; 16];
    read_exact_or_truncated(rdr, &mut padding[..padding_len(len)], section)
}
