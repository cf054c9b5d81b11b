use std::collections::HashSet;

pub fn parse_u16_set_csv(value: &str) -> Result<HashSet<u16>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("status code list is empty".to_string());
    }
    let mut out: HashSet<u16> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let code: u16 = item
            .parse()
            .map_err(|_| format!("invalid status code '{item}'"))?;
        out.insert(code);
    }
    if out.is_empty() {
        return Err("status code list is empty".to_string());
    }
    Ok(out)
}

pub fn parse_header_kv(value: &str) -> Result<(String, String), String> {
    let raw = value.trim();
    let (name, val) = raw
        .split_once(':')
        .ok_or_else(|| "expected format 'Key: Value'".to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name is empty".to_string());
    }
    Ok((name.to_string(), val.trim().to_string()))
}
