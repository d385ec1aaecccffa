use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(ZarrError::invalid_argument("x")
        .to_string()
        .contains("invalid argument:"));
    assert!(ZarrError::unsupported("x").to_string().contains("unsupported:"));
    assert!(ZarrError::io("x").to_string().contains("i/o error:"));
    assert!(ZarrError::codec("x").to_string().contains("codec error:"));
    assert!(ZarrError::precondition("x")
        .to_string()
        .contains("precondition violated:"));
    assert!(ZarrError::will_not_overwrite("x")
        .to_string()
        .contains("will not overwrite:"));
    assert!(ZarrError::internal("x").to_string().contains("internal error:"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ZarrError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn io_errors_convert() {
    let err: ZarrError = std::io::Error::other("disk gone").into();
    assert!(matches!(err, ZarrError::Io(_)));
}

#[test]
fn status_codes_map_by_kind() {
    assert_eq!(
        StatusCode::from(&ZarrError::invalid_argument("x")),
        StatusCode::InvalidArgument
    );
    assert_eq!(
        StatusCode::from(&ZarrError::unsupported("x")),
        StatusCode::InvalidArgument
    );
    assert_eq!(StatusCode::from(&ZarrError::io("x")), StatusCode::IOError);
    assert_eq!(
        StatusCode::from(&ZarrError::will_not_overwrite("x")),
        StatusCode::WillNotOverwrite
    );
    assert_eq!(
        StatusCode::from(&ZarrError::internal("x")),
        StatusCode::InternalError
    );
}

#[test]
fn status_of_result() {
    assert_eq!(StatusCode::of(&ZarrResult::Ok(())), StatusCode::Success);
    assert_eq!(
        StatusCode::of(&ZarrResult::<()>::Err(ZarrError::io("x"))),
        StatusCode::IOError
    );
}
