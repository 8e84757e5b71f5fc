// ==========================================
// 行数据同步导入 - 常用字段解析器
// ==========================================
// 用途: 作为 FieldOptions::parser 使用的文本解析函数
// - 金额: 千分位 / 括号负数 / 本地化小数点
// - 列表: 逗号、分号、" et "、" and " 分隔
// ==========================================

use crate::domain::value::FieldValue;

/// 金额书写习惯
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmountFormat {
    /// 1,000.50（逗号为千分位）
    #[default]
    EnUs,
    /// 1 000,50（逗号为小数点）
    FrFr,
}

/// 金额文本归一化为可解析的数字文本
///
/// # 示例
/// - "(1,000.0)" → "-1000.0"
/// - "-1 000,0"（FrFr）→ "-1000.0"
/// - "" / "-" → "0"
pub fn normalize_amount(text: &str, format: AmountFormat) -> String {
    let mut value = text.trim().to_string();
    if value.is_empty() {
        return "0".to_string();
    }

    if value.contains('(') {
        value = format!("-{}", value.replace(['(', ')'], ""));
    }
    value = match format {
        AmountFormat::EnUs => value.replace(',', ""),
        AmountFormat::FrFr => value.replace(',', "."),
    };
    // 普通空格与不换行空格
    value = value.replace([' ', '\u{a0}', '\u{202f}'], "");

    if value.is_empty() || value == "-" {
        return "0".to_string();
    }
    value
}

/// 解析金额为浮点数
pub fn parse_amount(text: &str, format: AmountFormat) -> Result<FieldValue, String> {
    let normalized = normalize_amount(text, format);
    normalized
        .parse::<f64>()
        .map(FieldValue::Float)
        .map_err(|_| format!("无法解析为金额: {}", text.trim()))
}

/// 生成金额解析器（用于 FieldOptions::parser）
pub fn amount_parser(format: AmountFormat) -> impl Fn(&str) -> Result<FieldValue, String> {
    move |text| parse_amount(text, format)
}

/// 拆分列表文本
///
/// # 规则
/// - ";"、" et "、" and " 先统一替换为 ","
/// - 引号包裹的元素去掉引号，内部逗号不拆分
/// - 括号内的逗号不拆分
/// - 空元素丢弃
pub fn parse_list(text: &str) -> Vec<String> {
    let value = text
        .trim()
        .replace(';', ", ")
        .replace(" et ", ", ")
        .replace(" and ", ", ");

    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;

    for c in value.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' if current.trim().is_empty() => {
                    current.clear();
                    current.push(c);
                    quote = Some(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                ',' if depth == 0 => {
                    push_item(&mut items, &current);
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    push_item(&mut items, &current);
    items
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    if !unquoted.is_empty() {
        items.push(unquoted.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount("", AmountFormat::EnUs), "0");
        assert_eq!(normalize_amount(" ", AmountFormat::EnUs), "0");
        assert_eq!(normalize_amount("-", AmountFormat::EnUs), "0");
        assert_eq!(normalize_amount("(1,000.0)", AmountFormat::EnUs), "-1000.0");
        assert_eq!(normalize_amount("-1,000.0", AmountFormat::EnUs), "-1000.0");
        assert_eq!(normalize_amount("-1 000,0", AmountFormat::FrFr), "-1000.0");
    }

    #[test]
    fn test_amount_parser() {
        let parser = amount_parser(AmountFormat::EnUs);
        assert_eq!(parser("2,500.5").unwrap(), FieldValue::Float(2500.5));
        assert!(parser("abc").is_err());
    }

    #[test]
    fn test_parse_list() {
        assert!(parse_list("").is_empty());
        assert_eq!(parse_list("val1"), vec!["val1"]);
        assert_eq!(parse_list("\"val1\""), vec!["val1"]);
        assert_eq!(parse_list("'val1'"), vec!["val1"]);
        assert_eq!(parse_list("val1; val2 et val3"), vec!["val1", "val2", "val3"]);
        assert_eq!(
            parse_list("val1, val2; val3 et val4"),
            vec!["val1", "val2", "val3", "val4"]
        );
        assert_eq!(parse_list(" ,val1 , val2 et val3, "), vec!["val1", "val2", "val3"]);
        assert_eq!(
            parse_list("val1 (1,2,3), val2 et val3"),
            vec!["val1 (1,2,3)", "val2", "val3"]
        );
        assert_eq!(
            parse_list("val1 (1,2,3), \"val2 et val3\""),
            vec!["val1 (1,2,3)", "val2, val3"]
        );
        assert_eq!(parse_list("caractères, accentués"), vec!["caractères", "accentués"]);
    }
}
