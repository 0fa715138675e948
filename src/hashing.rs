//! Вычисление дайджестов содержимого.
//!
//! Один потоковый контракт: вызывающий открывает файл один раз и передаёт
//! источник сюда. Между алгоритмами источник перематывается к позиции,
//! с которой начался расчёт. Содержимое нигде не кэшируется.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::str::FromStr;

use md5::Md5;
use ripemd::Ripemd160;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::HasherError;

/// Поддерживаемые алгоритмы.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum HashAlgorithm {
  Md5,
  Ripemd160,
  Sha1,
  Sha256,
  Sha384,
  Sha512,
}

/// Набор по умолчанию: две строки на запись журнала (MD5, затем SHA1).
pub const DEFAULT_ALGORITHMS: [HashAlgorithm; 2] = [HashAlgorithm::Md5, HashAlgorithm::Sha1];

impl HashAlgorithm {
  pub const ALL: [HashAlgorithm; 6] = [
    HashAlgorithm::Md5,
    HashAlgorithm::Ripemd160,
    HashAlgorithm::Sha1,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha384,
    HashAlgorithm::Sha512,
  ];

  /// Метка алгоритма в журнале и в уведомлениях.
  pub fn label(self) -> &'static str {
    match self {
      Self::Md5 => "MD5",
      Self::Ripemd160 => "RIPEMD160",
      Self::Sha1 => "SHA1",
      Self::Sha256 => "SHA256",
      Self::Sha384 => "SHA384",
      Self::Sha512 => "SHA512",
    }
  }

  /// Посчитать дайджест, вычитав `reader` от текущей позиции до конца.
  ///
  /// Возвращает hex в нижнем регистре.
  pub fn digest<R: Read + ?Sized>(self, reader: &mut R) -> io::Result<String> {
    match self {
      Self::Md5 => digest_hex::<Md5, R>(reader),
      Self::Ripemd160 => digest_hex::<Ripemd160, R>(reader),
      Self::Sha1 => digest_hex::<Sha1, R>(reader),
      Self::Sha256 => digest_hex::<Sha256, R>(reader),
      Self::Sha384 => digest_hex::<Sha384, R>(reader),
      Self::Sha512 => digest_hex::<Sha512, R>(reader),
    }
  }
}

impl fmt::Display for HashAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for HashAlgorithm {
  type Err = HasherError;

  /// Регистр не важен, `-` и `_` игнорируются: `sha-256` == `SHA256`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized: String = s
      .trim()
      .chars()
      .filter(|c| *c != '-' && *c != '_')
      .collect::<String>()
      .to_ascii_uppercase();

    Self::ALL
      .into_iter()
      .find(|alg| alg.label() == normalized)
      .ok_or_else(|| HasherError::UnsupportedAlgorithm(s.to_string()))
  }
}

impl TryFrom<String> for HashAlgorithm {
  type Error = HasherError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

/// Дайджест одного алгоритма.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashResult {
  pub algorithm: HashAlgorithm,
  pub hex_digest: String,
}

/// Посчитать дайджесты для `algorithms` в заданном порядке.
///
/// Каждый алгоритм читает `source` с позиции, на которой он был передан.
pub fn compute_hashes<R: Read + Seek + ?Sized>(
  source: &mut R,
  algorithms: &[HashAlgorithm],
) -> Result<Vec<HashResult>, HasherError> {
  let start = source.stream_position()?;
  let mut results = Vec::with_capacity(algorithms.len());

  for (idx, &algorithm) in algorithms.iter().enumerate() {
    if idx > 0 {
      source.seek(SeekFrom::Start(start))?;
    }
    let hex_digest = algorithm.digest(source)?;
    results.push(HashResult {
      algorithm,
      hex_digest,
    });
  }

  Ok(results)
}

fn digest_hex<D, R>(reader: &mut R) -> io::Result<String>
where
  D: Digest + Write,
  R: Read + ?Sized,
{
  let mut hasher = D::new();
  io::copy(reader, &mut hasher)?;
  Ok(hex::encode(hasher.finalize()))
}
