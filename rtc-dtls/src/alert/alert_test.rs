use super::*;

#[test]
fn test_alert() -> Result<()> {
    let a = Alert::unmarshal(&[0x02, 0x0A])?;
    assert_eq!(a.alert_level, AlertLevel::Fatal);
    assert_eq!(a.alert_description, AlertDescription::UnexpectedMessage);
    assert_eq!(a.marshal(), [0x02, 0x0A]);

    let close = Alert::unmarshal(&[0x01, 0x00])?;
    assert!(close.is_close_notify());

    assert_eq!(
        Alert::unmarshal(&[0x01]).unwrap_err(),
        Error::ErrLengthMismatch
    );
    assert_eq!(
        Alert::unmarshal(&[0x03, 0x63])?,
        Alert {
            alert_level: AlertLevel::Invalid,
            alert_description: AlertDescription::Invalid,
        }
    );

    Ok(())
}
