use std::{
    io::Write,
    path::{Path, PathBuf},
};

use aura_error::MailboxError;
use serde::{de::DeserializeOwned, Serialize};
use tempfile::Builder;

/// Длина заголовка формата перед полезной нагрузкой.
pub const MAGIC_LEN: usize = 4;

/// Сериализует значение в bincode с 4-байтовым заголовком формата.
pub fn encode_framed<T: Serialize>(
    magic: &[u8; MAGIC_LEN],
    value: &T,
) -> Result<Vec<u8>, MailboxError> {
    let body = bincode::serialize(value).map_err(|e| MailboxError::Encode {
        reason: e.to_string(),
    })?;

    let mut buf = Vec::with_capacity(MAGIC_LEN + body.len());
    buf.extend_from_slice(magic);
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Проверяет заголовок и декодирует тело.
///
/// `name` попадает в ошибку, чтобы по логам можно было найти битый файл.
pub fn decode_framed<T: DeserializeOwned>(
    magic: &[u8; MAGIC_LEN],
    bytes: &[u8],
    name: &str,
) -> Result<T, MailboxError> {
    let corrupt = |reason: String| MailboxError::CorruptRecord {
        name: name.to_string(),
        reason,
    };

    if bytes.len() < MAGIC_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    let (header, body) = bytes.split_at(MAGIC_LEN);
    if header != magic {
        return Err(corrupt(format!("bad magic {header:02x?}")));
    }

    bincode::deserialize(body).map_err(|e| corrupt(e.to_string()))
}

/// Атомарно записывает файл: сначала во временный файл в том же каталоге,
/// затем `rename` поверх `target`.
///
/// Читатель либо не видит файла, либо видит его целиком. Временные файлы
/// начинаются с `temp_prefix`, сканер их не перечисляет.
pub fn write_atomic(
    target: &Path,
    temp_prefix: &str,
    bytes: &[u8],
) -> Result<(), MailboxError> {
    let dir = parent_dir(target);

    let mut tmp = Builder::new()
        .prefix(temp_prefix)
        .tempfile_in(&dir)
        .map_err(|e| MailboxError::io(&dir, &e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_data())
        .map_err(|e| MailboxError::io(tmp.path(), &e))?;

    tmp.persist(target)
        .map_err(|e| MailboxError::io(target, &e.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
