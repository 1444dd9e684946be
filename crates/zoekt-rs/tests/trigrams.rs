use zoekt_rs::trigrams;

#[test]
fn basic_trigrams() {
    let v: Vec<[u8; 3]> = trigrams(b"Hello_Zoekt1").collect();
    assert!(v.contains(b"hel"));
    assert!(v.contains(b"o_z"));
    assert!(v.contains(b"kt1"));
}

#[test]
fn punctuation_breaks_runs() {
    let v: Vec<[u8; 3]> = trigrams(b"ab.cd-efg").collect();
    assert_eq!(v, vec![*b"efg"]);
}
