use std::{
    collections::BTreeMap,
    fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use aura_error::{AuraResult, AuthError, MailboxError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::permission::{Action, Permission};
use crate::mailbox::codec::{decode_framed, encode_framed, write_atomic};

/// Заголовок файла таблицы токенов.
pub const TOKEN_TABLE_MAGIC: &[u8; 4] = b"ATK1";
const TEMP_PREFIX: &str = ".tokens-";

/// Непрозрачный токен доступа.
///
/// Значение токена является секретом: `Debug` показывает только начало.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(Arc<str>);

/// Запись таблицы токенов в том виде, в каком она хранится на диске.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub owner: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct TokenEntry {
    owner: Arc<str>,
    grant: Arc<TokenGrant>,
    permissions: Arc<[Permission]>,
}

/// Таблица токенов: владелец и права для каждого токена.
///
/// Если задан файл, каждая новая запись сразу сохраняется в нём. Перед
/// записью таблица сливается с тем, что уже лежит на диске, так что
/// несколько процессов могут выпускать токены в одну таблицу. Неизвестный
/// токен приводит к перечитыванию файла, если тот изменился.
#[derive(Debug)]
pub struct TokenStore {
    tokens: DashMap<String, TokenEntry>,
    file: Option<PathBuf>,
    file_stamp: Mutex<Option<SystemTime>>,
    write_lock: Mutex<()>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Token {
    /// Новый случайный токен (UUID v4).
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TokenEntry {
    fn compile(grant: TokenGrant) -> Result<Self, AuthError> {
        let permissions = grant
            .permissions
            .iter()
            .map(|p| Permission::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            owner: Arc::from(grant.owner.as_str()),
            grant: Arc::new(grant),
            permissions: permissions.into(),
        })
    }
}

impl TokenStore {
    /// Таблица без файла: токены живут, пока жив процесс.
    pub fn in_memory() -> Self {
        Self {
            tokens: DashMap::new(),
            file: None,
            file_stamp: Mutex::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Открывает таблицу, связанную с файлом.
    ///
    /// Отсутствующий файл означает пустую таблицу. Нечитаемый файл
    /// записывается в лог, и таблица стартует пустой.
    pub fn open(path: impl Into<PathBuf>) -> AuraResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MailboxError::io(parent, &e))?;
        }

        let store = Self {
            file: Some(path),
            ..Self::in_memory()
        };
        match store.reload_if_changed() {
            Ok(loaded) => {
                if loaded {
                    info!(tokens = store.len(), "token table loaded");
                }
            }
            Err(err) => warn!(error = %err, "token table unreadable, starting empty"),
        }
        Ok(store)
    }

    /// Выпускает новый токен для `owner` с набором прав.
    ///
    /// Права разбираются до записи: если хоть одно некорректно, токен не
    /// создаётся. Если таблица связана с файлом, токен возвращается только
    /// после успешного сохранения.
    pub fn create<I, S>(
        &self,
        owner: &str,
        permissions: I,
    ) -> AuraResult<Token>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let grant = TokenGrant {
            owner: owner.to_string(),
            permissions: permissions
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .collect(),
            created_at: Utc::now(),
        };
        let entry = TokenEntry::compile(grant)?;
        let token = Token::generate();

        let _guard = self.write_lock.lock();
        if let Some(path) = &self.file {
            if let Err(err) = self.reload_if_changed() {
                warn!(error = %err, "token table merge skipped");
            }

            let mut table: BTreeMap<String, TokenGrant> = self
                .tokens
                .iter()
                .map(|e| (e.key().clone(), (*e.value().grant).clone()))
                .collect();
            table.insert(token.as_str().to_string(), (*entry.grant).clone());

            let bytes = encode_framed(TOKEN_TABLE_MAGIC, &table).map_err(|e| {
                AuthError::TokenTable {
                    reason: e.to_string(),
                }
            })?;
            write_atomic(path, TEMP_PREFIX, &bytes).map_err(|e| AuthError::TokenTable {
                reason: e.to_string(),
            })?;
            *self.file_stamp.lock() = modified_at(path);
        }

        debug!(owner, permissions = ?entry.grant.permissions, "token issued");
        self.tokens.insert(token.as_str().to_string(), entry);
        Ok(token)
    }

    /// Владелец токена.
    pub fn owner(
        &self,
        token: &Token,
    ) -> Option<Arc<str>> {
        self.lookup(token).map(|e| e.owner)
    }

    /// Полная запись для токена.
    pub fn grant(
        &self,
        token: &Token,
    ) -> Option<Arc<TokenGrant>> {
        self.lookup(token).map(|e| e.grant)
    }

    /// Проверяет право и возвращает владельца токена.
    pub fn check(
        &self,
        token: &Token,
        action: Action,
        topic: &str,
    ) -> Result<Arc<str>, AuthError> {
        let entry = self.lookup(token).ok_or_else(|| AuthError::UnknownToken {
            token: token.as_str().to_string(),
        })?;

        if entry.permissions.iter().any(|p| p.allows(action, topic)) {
            Ok(entry.owner)
        } else {
            Err(AuthError::PermissionDenied {
                owner: entry.owner.to_string(),
                action: action.to_string(),
                topic: topic.to_string(),
            })
        }
    }

    /// `true`, если токен известен и его права разрешают действие.
    pub fn authorize(
        &self,
        token: &Token,
        action: Action,
        topic: &str,
    ) -> bool {
        self.check(token, action, topic).is_ok()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Перечитывает файл таблицы, если его время изменения отличается от
    /// запомненного. Записи, уже известные в памяти, не заменяются.
    ///
    /// Возвращает `true`, если файл был прочитан.
    pub fn reload_if_changed(&self) -> AuraResult<bool> {
        let Some(path) = &self.file else {
            return Ok(false);
        };

        let stamp = modified_at(path);
        if stamp.is_none() || stamp == *self.file_stamp.lock() {
            return Ok(false);
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(MailboxError::io(path, &e).into()),
        };
        let name = path.display().to_string();
        let table: BTreeMap<String, TokenGrant> =
            decode_framed(TOKEN_TABLE_MAGIC, &bytes, &name).map_err(|e| AuthError::TokenTable {
                reason: e.to_string(),
            })?;

        for (token, grant) in table {
            if self.tokens.contains_key(&token) {
                continue;
            }
            let owner = grant.owner.clone();
            match TokenEntry::compile(grant) {
                Ok(entry) => {
                    self.tokens.insert(token, entry);
                }
                Err(err) => warn!(%owner, error = %err, "skipping token with malformed permissions"),
            }
        }
        *self.file_stamp.lock() = stamp;
        Ok(true)
    }

    fn lookup(
        &self,
        token: &Token,
    ) -> Option<TokenEntry> {
        if let Some(entry) = self.tokens.get(token.as_str()) {
            return Some(entry.clone());
        }

        match self.reload_if_changed() {
            Ok(true) => self.tokens.get(token.as_str()).map(|e| e.clone()),
            Ok(false) => None,
            Err(err) => {
                warn!(error = %err, "token table reload failed");
                None
            }
        }
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for TokenStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Token {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "Token({prefix}…)")
    }
}

impl fmt::Display for Token {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(Arc::from(value.trim()))
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(Arc::from(value.trim()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
