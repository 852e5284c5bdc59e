use super::*;

#[test]
fn test_controlled_get_from() -> Result<()> {
    let mut m = Message::new();
    let mut c = AttrControlled(4321);
    let result = c.get_from(&m);
    assert_eq!(result, Err(Error::ErrAttributeNotFound));

    m.build(&[Box::new(BINDING_REQUEST), Box::new(c)])?;

    let mut m1 = Message::new();
    m1.unmarshal_binary(&m.raw)?;

    let mut c1 = AttrControlled::default();
    c1.get_from(&m1)?;
    assert_eq!(c1, c, "not equal");

    // incorrect size
    let mut m3 = Message::new();
    m3.add(ATTR_ICE_CONTROLLED, &[0; 100]);
    let mut c2 = AttrControlled::default();
    assert_eq!(c2.get_from(&m3), Err(Error::ErrAttributeSizeInvalid));

    Ok(())
}

#[test]
fn test_control_get_from_role() -> Result<()> {
    let mut m = Message::new();
    let c = AttrControl {
        role: Role::Controlling,
        tie_breaker: TieBreaker(4321),
    };
    m.build(&[Box::new(BINDING_REQUEST), Box::new(c)])?;

    let mut m1 = Message::new();
    m1.unmarshal_binary(&m.raw)?;
    let mut c1 = AttrControl::default();
    c1.get_from(&m1)?;
    assert_eq!(c1, c);

    let mut controlling = AttrControlling::default();
    controlling.get_from(&m1)?;
    assert_eq!(controlling.0, 4321);

    let mut c2 = AttrControl::default();
    assert_eq!(
        c2.get_from(&Message::new()),
        Err(Error::ErrAttributeNotFound)
    );

    Ok(())
}
