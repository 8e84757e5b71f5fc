// ==========================================
// 行数据同步导入 - 列号换算
// ==========================================
// 职责: 电子表格 A1 记法列名 ↔ 列号（0 起）
// ==========================================

/// 列名 → 列号（0 起）
///
/// # 示例
/// - "A" → Some(0)
/// - "AF" → Some(31)
/// - "" / "A1" → None
pub fn column_index(name: &str) -> Option<usize> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut num: usize = 0;
    for c in trimmed.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        num = num.checked_mul(26)?.checked_add(digit)?;
    }
    Some(num - 1)
}

/// 列号（0 起）→ 列名
///
/// # 示例
/// - 0 → "A"
/// - 27 → "AB"
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut name = Vec::new();
    while n > 0 {
        let remainder = (n - 1) % 26;
        name.push(b'A' + remainder as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}
