// crates/pf_foundation/src/key.rs

//! 键命名规则
//!
//! 场与评估器共用一套字符串键；导数场的命名约定为 `d<输出>_d<自变量>`，
//! 例如水含量对温度的导数场键为 `dwater_content_dtemperature`。
//! 导数场只有在消费者请求导数时才会被物化。

/// 场 / 评估器键，按值比较与哈希
pub type Key = String;

/// 构造导数场的键: `d<of>_d<wrt>`
#[inline]
pub fn derivative_key(of: &str, wrt: &str) -> Key {
    format!("d{of}_d{wrt}")
}

/// 判断一个键是否为导数场键
pub fn is_derivative_key(key: &str) -> bool {
    split_derivative_key(key).is_some()
}

/// 拆分导数场键，返回 (输出键, 自变量键)
///
/// 自变量键本身可能含 `_d`，因此按**最后一个** `_d` 拆分；
/// 常规键（如 `depth`）返回 `None`。
pub fn split_derivative_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix('d')?;
    let pos = rest.rfind("_d")?;
    let (of, wrt) = (&rest[..pos], &rest[pos + 2..]);
    if of.is_empty() || wrt.is_empty() {
        return None;
    }
    Some((of, wrt))
}
